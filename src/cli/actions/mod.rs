pub mod activities;
pub mod attendance;
pub mod login;
pub mod logout;
pub mod roster;
pub mod scan;
pub mod stats;
pub mod watch;

// Internal "interpreter" for `Action`.
// The match lives in `run` so this module stays a list of actions.
mod run;

use crate::cli::globals::GlobalArgs;

/// Arguments of the commands that read one event.
#[derive(Debug)]
pub struct EventArgs {
    pub globals: GlobalArgs,
    pub event: String,
}

#[derive(Debug)]
pub enum Action {
    Login(login::Args),
    Logout(GlobalArgs),
    Activities(GlobalArgs),
    Stats(EventArgs),
    Roster(roster::Args),
    Attendance(attendance::Args),
    Scan(scan::Args),
    Watch(watch::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
