use crate::{
    cli::{console::SignedIn, globals::GlobalArgs},
    gateway::{Activity, Gateway},
    notify::TracingNotifier,
};
use anyhow::Result;
use std::sync::Arc;

/// Execute the activities action.
/// # Errors
/// Returns an error if the session is missing or the backend call fails.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let mut context = SignedIn::restore(&globals, Arc::new(TracingNotifier)).await?;
    let activities = match context.gateway.activities().await {
        Ok(activities) => activities,
        Err(err) => return Err(context.rejected(err)),
    };

    if activities.is_empty() {
        println!("No events available.");
    }
    for line in render(&activities) {
        println!("{line}");
    }
    Ok(())
}

fn render(activities: &[Activity]) -> Vec<String> {
    let width = activities
        .iter()
        .map(|activity| activity.collection.chars().count())
        .max()
        .unwrap_or(0);
    activities
        .iter()
        .map(|activity| format!("{:<width$}  {}", activity.collection, activity.name))
        .collect()
}
