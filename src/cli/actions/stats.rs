use crate::{
    cli::{actions::EventArgs, console::SignedIn},
    gateway::{Gateway, Stats},
    notify::TracingNotifier,
};
use anyhow::Result;
use std::sync::Arc;

/// Execute the stats action.
/// # Errors
/// Returns an error if the session is missing or the backend call fails.
pub async fn execute(args: EventArgs) -> Result<()> {
    let mut context = SignedIn::restore(&args.globals, Arc::new(TracingNotifier)).await?;
    match context.gateway.stats(&args.event).await {
        Ok(stats) => {
            println!("{}", render(&args.event, &stats));
            Ok(())
        }
        Err(err) => Err(context.rejected(err)),
    }
}

fn render(event: &str, stats: &Stats) -> String {
    format!(
        "{event}\n  registered: {}\n  attended:   {}\n  absent:     {}\n  attendance: {:.1}%",
        stats.total_registrations, stats.attended, stats.absent, stats.attendance_percentage
    )
}
