use crate::{
    auth::IssueFailurePolicy,
    cli::{
        actions::{
            Action, EventArgs, attendance, login,
            roster::{self, Filter, StatusFilter},
            scan, watch,
        },
        commands::{
            ARG_ABSENT, ARG_API_URL, ARG_CONTINUOUS, ARG_DELIVERY_FAILURE, ARG_DEVICE, ARG_EVENT,
            ARG_ID, ARG_INTERVAL, ARG_PASSWORD, ARG_SEARCH, ARG_SESSION_FILE, ARG_STATUS,
            ARG_TIMEOUT, ARG_USERNAME,
        },
        globals::GlobalArgs,
    },
};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let (name, sub_m) = matches
        .subcommand()
        .context("missing subcommand, see --help")?;
    let globals = globals(matches)?;

    let action = match name {
        "login" => Action::Login(login::Args {
            globals,
            username: sub_m.get_one::<String>(ARG_USERNAME).cloned(),
            password: sub_m
                .get_one::<String>(ARG_PASSWORD)
                .map(|password| SecretString::from(password.as_str())),
            issue_failure: sub_m
                .get_one::<String>(ARG_DELIVERY_FAILURE)
                .map(|policy| policy.parse::<IssueFailurePolicy>())
                .transpose()
                .map_err(|e| anyhow!(e))?
                .unwrap_or_default(),
        }),
        "logout" => Action::Logout(globals),
        "activities" => Action::Activities(globals),
        "stats" => Action::Stats(EventArgs {
            event: event(sub_m)?,
            globals,
        }),
        "roster" => Action::Roster(roster::Args {
            event: event(sub_m)?,
            filter: Filter {
                search: sub_m
                    .get_one::<String>(ARG_SEARCH)
                    .map(|search| search.trim().to_string())
                    .filter(|search| !search.is_empty()),
                status: sub_m
                    .get_one::<String>(ARG_STATUS)
                    .map(|status| status.parse::<StatusFilter>())
                    .transpose()
                    .map_err(|e| anyhow!(e))?
                    .unwrap_or_default(),
            },
            globals,
        }),
        "attendance" => Action::Attendance(attendance::Args {
            event: event(sub_m)?,
            id: sub_m
                .get_one::<String>(ARG_ID)
                .cloned()
                .context("missing required argument: <ID>")?,
            attended: !sub_m.get_flag(ARG_ABSENT),
            globals,
        }),
        "scan" => {
            let devices: Vec<PathBuf> = sub_m
                .get_many::<PathBuf>(ARG_DEVICE)
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            if devices.is_empty() {
                return Err(anyhow!("missing required argument: --device"));
            }
            Action::Scan(scan::Args {
                event: sub_m
                    .get_one::<String>(ARG_EVENT)
                    .map(|event| event.trim().to_string())
                    .filter(|event| !event.is_empty()),
                devices,
                continuous: sub_m.get_flag(ARG_CONTINUOUS),
                globals,
            })
        }
        "watch" => Action::Watch(watch::Args {
            event: event(sub_m)?,
            interval: Duration::from_secs(
                sub_m.get_one::<u64>(ARG_INTERVAL).copied().unwrap_or(10),
            ),
            globals,
        }),
        other => return Err(anyhow!("unknown subcommand: {other}")),
    };

    Ok(action)
}

fn globals(matches: &ArgMatches) -> Result<GlobalArgs> {
    let api_url = matches
        .get_one::<Url>(ARG_API_URL)
        .cloned()
        .context("missing required argument: --api-url")?;
    let session_file = matches.get_one::<PathBuf>(ARG_SESSION_FILE).cloned();
    let timeout = matches.get_one::<u64>(ARG_TIMEOUT).copied().unwrap_or(10);

    Ok(GlobalArgs::new(
        api_url,
        session_file,
        Duration::from_secs(timeout),
    ))
}

fn event(matches: &ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(ARG_EVENT)
        .map(|event| event.trim().to_string())
        .filter(|event| !event.is_empty())
        .context("missing required argument: --event")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    const CLEAN_ENV: [(&str, Option<&str>); 10] = [
        ("ROLLCALL_API_URL", None),
        ("ROLLCALL_SESSION_FILE", None),
        ("ROLLCALL_TIMEOUT", None),
        ("ROLLCALL_USERNAME", None),
        ("ROLLCALL_PASSWORD", None),
        ("ROLLCALL_DELIVERY_FAILURE", None),
        ("ROLLCALL_EVENT", None),
        ("ROLLCALL_SCANNER_DEVICE", None),
        ("ROLLCALL_SEARCH", None),
        ("ROLLCALL_STATUS", None),
    ];

    fn dispatch(args: &[&str]) -> Result<Action> {
        let matches = commands::new().try_get_matches_from(args)?;
        handler(&matches)
    }

    #[test]
    fn api_url_is_required() {
        temp_env::with_vars(CLEAN_ENV, || {
            let err = dispatch(&["rollcall", "activities"]).err();
            assert!(
                err.is_some_and(|err| err.to_string().contains("--api-url")),
                "expected a missing --api-url error"
            );
        });
    }

    #[test]
    fn login_carries_credentials_and_policy() {
        temp_env::with_vars(CLEAN_ENV, || {
            let action = dispatch(&[
                "rollcall",
                "--api-url",
                "http://localhost:4000",
                "--session-file",
                "/tmp/rollcall-session.json",
                "login",
                "--username",
                "organizador",
                "--password",
                "secret",
                "--on-delivery-failure",
                "remediate",
            ]);
            let Ok(Action::Login(args)) = action else {
                panic!("expected a login action");
            };
            assert_eq!(args.username.as_deref(), Some("organizador"));
            assert_eq!(
                args.password.as_ref().map(ExposeSecret::expose_secret),
                Some("secret")
            );
            assert_eq!(args.issue_failure, IssueFailurePolicy::Remediate);
            assert_eq!(
                args.globals.session_file,
                PathBuf::from("/tmp/rollcall-session.json")
            );
            assert_eq!(args.globals.timeout, Duration::from_secs(10));
        });
    }

    #[test]
    fn attendance_defaults_to_present() {
        temp_env::with_vars(CLEAN_ENV, || {
            let action = dispatch(&[
                "rollcall",
                "--api-url",
                "http://localhost:4000",
                "attendance",
                "p42",
                "--event",
                "taller_rust",
            ]);
            let Ok(Action::Attendance(args)) = action else {
                panic!("expected an attendance action");
            };
            assert_eq!(args.id, "p42");
            assert_eq!(args.event, "taller_rust");
            assert!(args.attended);
        });
    }

    #[test]
    fn roster_filters_come_from_flags_and_env() {
        temp_env::with_vars(CLEAN_ENV, || {
            let action = dispatch(&[
                "rollcall",
                "--api-url",
                "http://localhost:4000",
                "roster",
                "-e",
                "taller_rust",
            ]);
            let Ok(Action::Roster(args)) = action else {
                panic!("expected a roster action");
            };
            assert_eq!(args.filter, Filter::default());
        });

        temp_env::with_vars(
            [
                ("ROLLCALL_API_URL", Some("http://localhost:4000")),
                ("ROLLCALL_EVENT", Some("taller_rust")),
                ("ROLLCALL_SEARCH", Some(" ana ")),
                ("ROLLCALL_STATUS", Some("absent")),
            ],
            || {
                let action = dispatch(&["rollcall", "roster"]);
                let Ok(Action::Roster(args)) = action else {
                    panic!("expected a roster action");
                };
                assert_eq!(args.filter.search.as_deref(), Some("ana"));
                assert_eq!(args.filter.status, StatusFilter::Absent);
            },
        );
    }

    #[test]
    fn blank_event_is_rejected() {
        temp_env::with_vars(CLEAN_ENV, || {
            let err = dispatch(&[
                "rollcall",
                "--api-url",
                "http://localhost:4000",
                "stats",
                "--event",
                "  ",
            ])
            .err();
            assert!(err.is_some_and(|err| err.to_string().contains("--event")));
        });
    }

    #[test]
    fn scan_event_is_optional() {
        temp_env::with_vars(
            [
                ("ROLLCALL_API_URL", Some("http://localhost:4000")),
                ("ROLLCALL_SCANNER_DEVICE", Some("/dev/ttyACM0")),
                ("ROLLCALL_EVENT", None),
            ],
            || {
                let action = dispatch(&["rollcall", "scan"]);
                let Ok(Action::Scan(args)) = action else {
                    panic!("expected a scan action");
                };
                assert_eq!(args.event, None);
                assert_eq!(args.devices, vec![PathBuf::from("/dev/ttyACM0")]);
                assert!(!args.continuous);
            },
        );
    }

    #[test]
    fn watch_interval_is_seconds() {
        temp_env::with_vars(CLEAN_ENV, || {
            let action = dispatch(&[
                "rollcall",
                "--api-url",
                "http://localhost:4000",
                "watch",
                "--event",
                "taller_rust",
                "--interval",
                "30",
            ]);
            let Ok(Action::Watch(args)) = action else {
                panic!("expected a watch action");
            };
            assert_eq!(args.interval, Duration::from_secs(30));
        });
    }
}
