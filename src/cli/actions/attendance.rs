use crate::{
    cli::{console::SignedIn, globals::GlobalArgs},
    gateway::Gateway,
    notify::TracingNotifier,
};
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub event: String,
    pub id: String,
    pub attended: bool,
}

/// Execute the attendance action.
/// # Errors
/// Returns an error if the session is missing or the backend refuses the change.
pub async fn execute(args: Args) -> Result<()> {
    let mut context = SignedIn::restore(&args.globals, Arc::new(TracingNotifier)).await?;
    let ack = match context
        .gateway
        .set_attendance(&args.id, &args.event, args.attended)
        .await
    {
        Ok(ack) => ack,
        Err(err) => return Err(context.rejected(err)),
    };

    if !ack.success {
        bail!(
            ack.message
                .unwrap_or_else(|| "Attendance could not be updated.".to_string())
        );
    }
    info!(participant = %args.id, event = %args.event, attended = args.attended, "attendance updated");
    println!(
        "{}",
        ack.message.unwrap_or_else(|| if args.attended {
            format!("{} marked as attended.", args.id)
        } else {
            format!("{} marked as absent.", args.id)
        })
    );
    Ok(())
}
