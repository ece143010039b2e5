use crate::{
    cli::{console::SignedIn, globals::GlobalArgs},
    gateway::{Gateway, ParticipantRecord},
    notify::TracingNotifier,
};
use anyhow::Result;
use std::{str::FromStr, sync::Arc};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub event: String,
    pub filter: Filter,
}

/// Attendance status a roster row must have to be listed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Attended,
    Absent,
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(Self::All),
            "attended" => Ok(Self::Attended),
            "absent" => Ok(Self::Absent),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    /// Case-insensitive text matched against name, email and phone.
    pub search: Option<String>,
    pub status: StatusFilter,
}

impl Filter {
    fn is_active(&self) -> bool {
        self.search.is_some() || self.status != StatusFilter::All
    }

    fn matches(&self, participant: &ParticipantRecord) -> bool {
        let status = match self.status {
            StatusFilter::All => true,
            StatusFilter::Attended => participant.attended,
            StatusFilter::Absent => !participant.attended,
        };
        let text = match self.search.as_deref() {
            Some(term) => contains_term(participant, term),
            None => true,
        };
        status && text
    }
}

fn contains_term(participant: &ParticipantRecord, term: &str) -> bool {
    let term = term.to_lowercase();
    [
        Some(participant.name.as_str()),
        Some(participant.email.as_str()),
        participant.phone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&term))
}

/// Execute the roster action.
/// # Errors
/// Returns an error if the session is missing or the backend call fails.
pub async fn execute(args: Args) -> Result<()> {
    let mut context = SignedIn::restore(&args.globals, Arc::new(TracingNotifier)).await?;
    let participants = match context.gateway.registrations(&args.event).await {
        Ok(participants) => participants,
        Err(err) => return Err(context.rejected(err)),
    };

    let listed: Vec<&ParticipantRecord> = participants
        .iter()
        .filter(|participant| args.filter.matches(participant))
        .collect();
    for participant in &listed {
        println!("{}", row(participant));
    }
    if args.filter.is_active() {
        println!("{} of {} registrations match", listed.len(), participants.len());
    }
    let attended = participants.iter().filter(|p| p.attended).count();
    println!("{attended}/{} checked in", participants.len());
    Ok(())
}

fn row(participant: &ParticipantRecord) -> String {
    let mark = if participant.attended { "[x]" } else { "[ ]" };
    let mut line = format!("{mark} {}  {}", participant.id, participant.name);
    if let Some(document) = &participant.document {
        line.push_str(&format!("  doc {document}"));
    }
    if !participant.email.is_empty() {
        line.push_str(&format!("  <{}>", participant.email));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str, name: &str, email: &str, phone: Option<&str>, attended: bool) -> ParticipantRecord {
        ParticipantRecord {
            id: id.to_string(),
            name: name.to_string(),
            document: None,
            email: email.to_string(),
            phone: phone.map(str::to_string),
            program: None,
            attended,
        }
    }

    fn listed(filter: &Filter, participants: &[ParticipantRecord]) -> Vec<String> {
        participants
            .iter()
            .filter(|participant| filter.matches(participant))
            .map(|participant| participant.id.clone())
            .collect()
    }

    fn roster() -> Vec<ParticipantRecord> {
        vec![
            participant("p1", "Ana Ruiz", "ana@example.org", Some("3001234567"), true),
            participant("p2", "Luis Gómez", "lgomez@example.org", None, false),
            participant("p3", "Marta Díaz", "", Some("3109876543"), false),
        ]
    }

    #[test]
    fn rows_show_the_attendance_mark() {
        let mut participant = participant("p42", "Ana Ruiz", "ana@example.org", None, true);
        participant.document = Some("1020304050".to_string());
        assert_eq!(
            row(&participant),
            "[x] p42  Ana Ruiz  doc 1020304050  <ana@example.org>"
        );
    }

    #[test]
    fn default_filter_lists_everyone() {
        let filter = Filter::default();
        assert!(!filter.is_active());
        assert_eq!(listed(&filter, &roster()), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn search_matches_name_email_and_phone() {
        let by_name = Filter {
            search: Some("GÓMEZ".to_string()),
            ..Filter::default()
        };
        assert_eq!(listed(&by_name, &roster()), vec!["p2"]);

        let by_email = Filter {
            search: Some("ana@".to_string()),
            ..Filter::default()
        };
        assert_eq!(listed(&by_email, &roster()), vec!["p1"]);

        let by_phone = Filter {
            search: Some("310".to_string()),
            ..Filter::default()
        };
        assert_eq!(listed(&by_phone, &roster()), vec!["p3"]);
    }

    #[test]
    fn status_narrows_the_search() {
        let absent = Filter {
            search: None,
            status: StatusFilter::Absent,
        };
        assert!(absent.is_active());
        assert_eq!(listed(&absent, &roster()), vec!["p2", "p3"]);

        let attended_example = Filter {
            search: Some("example.org".to_string()),
            status: StatusFilter::Attended,
        };
        assert_eq!(listed(&attended_example, &roster()), vec!["p1"]);
    }

    #[test]
    fn status_parses_its_names() {
        assert_eq!("absent".parse::<StatusFilter>(), Ok(StatusFilter::Absent));
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert!("present".parse::<StatusFilter>().is_err());
    }
}
