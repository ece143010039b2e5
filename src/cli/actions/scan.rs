use crate::{
    auth::messages,
    cli::{
        console::{Console, SignedIn},
        globals::GlobalArgs,
    },
    gateway::{Gateway, ParticipantRecord},
    scanner::{Camera, FeedCamera, MessageKind, ScanState, ScannerConfig, ScannerMachine},
};
use anyhow::{Result, bail};
use std::{path::PathBuf, sync::Arc};
use tracing::debug;

const HELP: &str =
    "Enter: start / confirm  ·  c confirm  ·  x cancel  ·  t stop  ·  q quit";

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub event: Option<String>,
    pub devices: Vec<PathBuf>,
    pub continuous: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Key {
    Start,
    Confirm,
    Cancel,
    Stop,
    Quit,
    Ignore,
    Help,
}

fn key(line: &str, state: ScanState) -> Key {
    match line {
        "" => match state {
            ScanState::Idle | ScanState::Error => Key::Start,
            ScanState::ShowingResult => Key::Confirm,
            ScanState::Starting | ScanState::Scanning | ScanState::Resolving => Key::Ignore,
        },
        "s" => Key::Start,
        "c" => Key::Confirm,
        "x" => Key::Cancel,
        "t" => Key::Stop,
        "q" => Key::Quit,
        _ => Key::Help,
    }
}

/// Execute the scan action.
/// # Errors
/// Returns an error if the session is missing or expires while scanning.
pub async fn execute(args: Args) -> Result<()> {
    let mut console = Console::new();
    let mut context = SignedIn::restore(&args.globals, console.notifier()).await?;

    let event = match args.event {
        Some(event) => event,
        None => first_event(&mut context).await?,
    };

    let (mut scanner, mut events) = ScannerMachine::new(
        Arc::clone(&context.gateway),
        FeedCamera::new(args.devices),
        console.notifier(),
        ScannerConfig::default(),
    );
    scanner.set_event(Some(event.clone()));
    scanner.set_continuous(args.continuous);

    println!("Event: {event}");
    println!("{HELP}");
    let mut shown: Option<(ScanState, String)> = None;
    render(&scanner, &mut shown);

    loop {
        let result = tokio::select! {
            Some(scan_event) = events.recv() => scanner.handle(scan_event).await,
            line = console.next_line() => {
                let Some(line) = line else { break };
                match key(&line, scanner.state()) {
                    Key::Start => scanner.start().await,
                    Key::Confirm => scanner.confirm().await,
                    Key::Cancel => {
                        scanner.cancel();
                        Ok(())
                    }
                    Key::Stop => {
                        scanner.stop();
                        Ok(())
                    }
                    Key::Quit => break,
                    Key::Ignore => Ok(()),
                    Key::Help => {
                        println!("{HELP}");
                        Ok(())
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        };

        let reported = console.flush_notices();
        if let Err(err) = result {
            debug!(kind = ?err.kind(), "scanner step failed");
            if err.api().is_some_and(|api| context.auth.on_api_error(api)) {
                scanner.shutdown();
                console.flush_notices();
                bail!(messages::SESSION_EXPIRED);
            }
            if !reported {
                eprintln!("✖ {err}");
            }
        }
        render(&scanner, &mut shown);
    }

    scanner.shutdown();
    Ok(())
}

/// Without `--event` the first listed event is scanned, as the check-in
/// screen does on load.
async fn first_event(context: &mut SignedIn) -> Result<String> {
    let activities = match context.gateway.activities().await {
        Ok(activities) => activities,
        Err(err) => return Err(context.rejected(err)),
    };
    match activities.into_iter().next() {
        Some(activity) => Ok(activity.collection),
        None => bail!("No events available. Pass --event to choose one."),
    }
}

/// Prints the status line when it changes. Successes and errors already
/// reached the operator as notices.
fn render<G, C>(scanner: &ScannerMachine<G, C>, shown: &mut Option<(ScanState, String)>)
where
    G: Gateway,
    C: Camera,
{
    let message = scanner.message();
    let current = (scanner.state(), message.text.clone());
    if shown.as_ref() == Some(&current) {
        return;
    }
    if message.kind == MessageKind::Info {
        println!("{}", message.text);
    }
    if scanner.state() == ScanState::ShowingResult {
        if let Some(participant) = scanner.participant() {
            for line in details(participant) {
                println!("  {line}");
            }
        }
    }
    *shown = Some(current);
}

fn details(participant: &ParticipantRecord) -> Vec<String> {
    let mut lines = vec![format!("id: {}", participant.id)];
    if let Some(document) = &participant.document {
        lines.push(format!("document: {document}"));
    }
    if !participant.email.is_empty() {
        lines.push(format!("email: {}", participant.email));
    }
    if let Some(program) = &participant.program {
        lines.push(format!("program: {program}"));
    }
    lines.push(if participant.attended {
        "status: already checked in".to_string()
    } else {
        "status: not checked in (Enter to confirm, x to cancel)".to_string()
    });
    lines
}
