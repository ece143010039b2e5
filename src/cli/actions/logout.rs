use crate::{
    auth::{AuthConfig, AuthMachine},
    cli::globals::GlobalArgs,
    notify::TracingNotifier,
};
use anyhow::Result;
use std::sync::Arc;

/// Execute the logout action. The backend is not contacted.
/// # Errors
/// Returns an error if the session file cannot be removed.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let sessions = globals.sessions();
    let signed_in = sessions.load().ok().flatten().is_some();
    let gateway = Arc::new(globals.gateway(Arc::clone(&sessions))?);
    let (mut auth, _ticks) =
        AuthMachine::new(gateway, sessions, Arc::new(TracingNotifier), AuthConfig::default());

    auth.logout()?;
    if signed_in {
        println!("Signed out.");
    } else {
        println!("No session stored.");
    }
    Ok(())
}
