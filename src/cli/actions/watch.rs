use crate::{
    auth::messages,
    cli::{
        console::{Console, SignedIn},
        globals::GlobalArgs,
    },
    gateway::Update,
    updates::UpdatesWatcher,
};
use anyhow::{Result, bail};
use std::{sync::Arc, time::Duration};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub event: String,
    pub interval: Duration,
}

/// Execute the watch action. Runs until `q`, end of input, or Ctrl-C.
/// # Errors
/// Returns an error if the session is missing or the backend rejects it
/// while watching.
pub async fn execute(args: Args) -> Result<()> {
    let mut console = Console::new();
    let mut context = SignedIn::restore(&args.globals, console.notifier()).await?;

    let (watcher, mut batches) = UpdatesWatcher::spawn(
        Arc::clone(&context.gateway),
        args.event.clone(),
        args.interval,
        console.notifier(),
    );
    println!(
        "Watching {} every {}s (Enter to refresh, q to quit)",
        args.event,
        args.interval.as_secs()
    );

    loop {
        tokio::select! {
            Some(poll) = batches.recv() => match poll {
                Ok(batch) => {
                    console.flush_notices();
                    for update in &batch {
                        println!("{}", describe(update));
                    }
                }
                Err(err) if context.auth.on_api_error(&err) => {
                    console.flush_notices();
                    bail!(messages::SESSION_EXPIRED);
                }
                Err(err) => eprintln!("! Updates unavailable: {err}"),
            },
            line = console.next_line() => match line.as_deref() {
                None | Some("q") => break,
                Some(_) => watcher.refresh(),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(watcher);
    Ok(())
}

fn describe(update: &Update) -> String {
    let who = update.participant_id.as_deref().unwrap_or("?");
    match update.payload.get("asistencia").and_then(serde_json::Value::as_bool) {
        Some(true) => format!("{who} checked in"),
        Some(false) => format!("{who} marked absent"),
        None => format!("{who} changed: {}", update.payload),
    }
}
