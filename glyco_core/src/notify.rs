//! Fire-and-forget alert delivery.
//!
//! Alerts are pushed onto an unbounded channel and drained by a background
//! task, so a slow or failing notification collaborator can never hold up a
//! generation cycle. Each notice gets exactly one delivery attempt; failures
//! are logged and dropped.

use crate::{AlertNotice, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receiver side of alerts (email, push, pager, ...)
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notice: &AlertNotice) -> Result<()>;
}

/// Sink that only writes alerts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notice: &AlertNotice) -> Result<()> {
        tracing::warn!(
            severity = %notice.severity,
            bgl = notice.bgl,
            trend = %notice.trend,
            "{}",
            notice.rationale
        );
        Ok(())
    }
}

/// Owns the channel and the delivery task
///
/// Must be created from within a Tokio runtime.
pub struct Dispatcher {
    tx: Mutex<Option<mpsc::UnboundedSender<AlertNotice>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(deliver(sink, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue a notice for delivery; never blocks
    pub fn dispatch(&self, notice: AlertNotice) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => {
                if tx.send(notice).is_err() {
                    tracing::warn!("Notification task has exited; alert dropped");
                }
            }
            None => tracing::warn!("Dispatcher closed; alert dropped"),
        }
    }

    /// Stop accepting notices and wait for queued ones to be attempted
    pub async fn close(&self) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(tx);

        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Notification task ended abnormally: {}", e);
            }
        }
    }
}

async fn deliver(sink: Arc<dyn NotificationSink>, mut rx: mpsc::UnboundedReceiver<AlertNotice>) {
    while let Some(notice) = rx.recv().await {
        let sink = Arc::clone(&sink);
        let severity = notice.severity;
        // Sinks are synchronous and may do I/O
        let outcome = tokio::task::spawn_blocking(move || sink.notify(&notice)).await;
        match outcome {
            Ok(Ok(())) => tracing::debug!("Delivered {} alert", severity),
            Ok(Err(e)) => tracing::warn!("Failed to deliver {} alert: {}", severity, e),
            Err(e) => tracing::warn!("Notification sink panicked: {}", e),
        }
    }
    tracing::debug!("Notification channel closed");
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::{Severity, Trend};
    use chrono::Utc;

    fn notice(bgl: u16) -> AlertNotice {
        AlertNotice {
            timestamp: Utc::now(),
            severity: Severity::Critical,
            bgl,
            trend: Trend::Steady,
            rationale: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers_each_notice_once() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::spawn(sink.clone());

        dispatcher.dispatch(notice(60));
        dispatcher.dispatch(notice(300));
        dispatcher.close().await;

        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].bgl, 60);
        assert_eq!(received[1].bgl, 300);
    }

    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let dispatcher = Dispatcher::spawn(Arc::new(FailingSink));
        dispatcher.dispatch(notice(55));
        dispatcher.close().await;
    }

    #[tokio::test]
    async fn test_dispatch_after_close_is_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::spawn(sink.clone());
        dispatcher.close().await;
        dispatcher.dispatch(notice(50));
        assert_eq!(sink.count(), 0);
    }
}
