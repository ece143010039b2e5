//! Background polling of the per-event updates feed.
//!
//! Independent of both state machines; only the console consumes it. The
//! watcher asks for changes newer than its watermark on a fixed period and
//! forwards each non-empty batch. Failed polls are forwarded too, so the owner
//! can end a rejected session. The watermark moves only when a batch arrives.
//! Dropping the [`UpdatesWatcher`] stops the task.

use crate::{
    gateway::{ApiError, Gateway, Update},
    notify::Notifier,
};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{
    sync::{
        Notify,
        mpsc::{self, UnboundedReceiver},
    },
    task::AbortHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{Instrument, debug, info_span, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub type Poll = Result<Vec<Update>, ApiError>;

pub struct UpdatesWatcher {
    task: AbortHandle,
    refresh: Arc<Notify>,
}

impl UpdatesWatcher {
    /// Starts polling `collection`. Batches and failed polls arrive on the
    /// returned receiver.
    #[must_use]
    pub fn spawn<G>(
        gateway: Arc<G>,
        collection: String,
        period: Duration,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, UnboundedReceiver<Poll>)
    where
        G: Gateway + 'static,
    {
        let (batches, rx) = mpsc::unbounded_channel();
        let refresh = Arc::new(Notify::new());
        let wake = Arc::clone(&refresh);
        let span = info_span!("updates.watch", collection = %collection);

        let task = tokio::spawn(
            async move {
                let mut since = now_millis();
                let mut ticks = interval_at(Instant::now() + period, period);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticks.tick() => {}
                        () = wake.notified() => {}
                    }

                    let requested_at = now_millis();
                    let poll = match gateway.updates(&collection, since).await {
                        Ok(batch) if batch.is_empty() => {
                            debug!("no updates");
                            continue;
                        }
                        Ok(batch) => {
                            since = requested_at;
                            notifier.notify_info(&batch_message(batch.len()));
                            Ok(batch)
                        }
                        Err(err) => {
                            warn!(status = err.status, error = %err, "updates poll failed");
                            Err(err)
                        }
                    };
                    if batches.send(poll).is_err() {
                        break;
                    }
                }
            }
            .instrument(span),
        );

        let watcher = Self {
            task: task.abort_handle(),
            refresh,
        };
        (watcher, rx)
    }

    /// Polls right away instead of waiting for the next period.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }
}

impl Drop for UpdatesWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn batch_message(count: usize) -> String {
    if count == 1 {
        "1 new update".to_string()
    } else {
        format!("{count} new updates")
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        gateway::ApiError,
        notify::NoticeLevel,
        test_support::{Call, FakeGateway, RecordingNotifier},
    };
    use serde_json::json;

    fn update(id: &str) -> Update {
        Update {
            participant_id: Some(id.to_string()),
            payload: json!({"_id": id, "asistencia": true}),
        }
    }

    fn since_values(gateway: &FakeGateway) -> Vec<u64> {
        gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Updates { since, .. } => Some(since),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_forwarded_with_a_notice() {
        let gateway = FakeGateway::new();
        let notifier = RecordingNotifier::new();
        gateway.updates.push(Ok(Vec::new()));
        gateway.updates.push(Ok(vec![update("p1"), update("p2")]));

        let (_watcher, mut rx) = UpdatesWatcher::spawn(
            Arc::clone(&gateway),
            "taller_rust".to_string(),
            DEFAULT_POLL_INTERVAL,
            notifier.clone(),
        );

        let batch = rx.recv().await.unwrap().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(notifier.levels(), vec![NoticeLevel::Info]);
        assert_eq!(notifier.messages(), vec!["2 new updates".to_string()]);
        assert_eq!(since_values(&gateway).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn watermark_moves_only_after_a_batch() {
        let gateway = FakeGateway::new();
        gateway.updates.push(Err(ApiError::transport("offline")));
        gateway.updates.push(Ok(vec![update("p1")]));

        let (watcher, mut rx) = UpdatesWatcher::spawn(
            Arc::clone(&gateway),
            "taller_rust".to_string(),
            DEFAULT_POLL_INTERVAL,
            RecordingNotifier::new(),
        );
        assert_eq!(rx.recv().await.unwrap().unwrap_err().status, 0);
        assert_eq!(rx.recv().await.unwrap().unwrap().len(), 1);

        let since = since_values(&gateway);
        assert_eq!(since.len(), 2);
        assert_eq!(since[0], since[1]);
        drop(watcher);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_watcher_stops_polling() {
        let gateway = FakeGateway::new();
        let (watcher, mut rx) = UpdatesWatcher::spawn(
            Arc::clone(&gateway),
            "taller_rust".to_string(),
            DEFAULT_POLL_INTERVAL,
            RecordingNotifier::new(),
        );
        drop(watcher);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(gateway.calls().is_empty());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_polls_immediately() {
        let gateway = FakeGateway::new();
        gateway.updates.push(Ok(vec![update("p9")]));
        let (watcher, mut rx) = UpdatesWatcher::spawn(
            Arc::clone(&gateway),
            "taller_rust".to_string(),
            Duration::from_secs(3600),
            RecordingNotifier::new(),
        );

        watcher.refresh();
        let started = Instant::now();
        let batch = rx.recv().await.unwrap().unwrap();
        assert_eq!(batch[0].participant_id.as_deref(), Some("p9"));
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_polls_reach_the_owner() {
        let gateway = FakeGateway::new();
        let notifier = RecordingNotifier::new();
        gateway.updates.push(Err(ApiError::new(401, "Token inválido")));

        let (_watcher, mut rx) = UpdatesWatcher::spawn(
            Arc::clone(&gateway),
            "taller_rust".to_string(),
            DEFAULT_POLL_INTERVAL,
            notifier.clone(),
        );

        let err = rx.recv().await.unwrap().unwrap_err();
        assert!(err.is_unauthorized());
        assert!(notifier.messages().is_empty());
    }
}
