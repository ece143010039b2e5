use crate::cli::actions::{
    Action, activities, attendance, login, logout, roster, scan, stats, watch,
};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => login::execute(args).await,
        Action::Logout(globals) => logout::execute(globals).await,
        Action::Activities(globals) => activities::execute(globals).await,
        Action::Stats(args) => stats::execute(args).await,
        Action::Roster(args) => roster::execute(args).await,
        Action::Attendance(args) => attendance::execute(args).await,
        Action::Scan(args) => scan::execute(args).await,
        Action::Watch(args) => watch::execute(args).await,
    }
}
