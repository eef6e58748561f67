use crate::incident::Incident;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Best-effort notification sink. Implementations must catch and log
/// delivery errors themselves; nothing here propagates back to the ledger.
pub trait Notifier: Send + Sync + 'static {
    fn notify_incident(&self, incident: &Incident) -> impl Future<Output = ()> + Send;
    fn notify_recovery(&self, incident: &Incident) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone)]
pub enum NotifyEvent {
    Opened(Incident),
    Resolved(Incident),
}

/// Non-blocking handle the ledger uses to enqueue notifications onto the
/// notifier's own task. Enqueueing never fails the caller.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::UnboundedSender<NotifyEvent>,
}

impl NotifyHandle {
    pub fn incident_opened(&self, incident: Incident) {
        self.send(NotifyEvent::Opened(incident));
    }

    pub fn incident_resolved(&self, incident: Incident) {
        self.send(NotifyEvent::Resolved(incident));
    }

    fn send(&self, event: NotifyEvent) {
        if self.tx.send(event).is_err() {
            debug!("notifier task gone, dropping event");
        }
    }
}

/// Spawns the delivery loop on its own task and returns the handle to feed
/// it. The task drains remaining events and exits once every handle is
/// dropped.
pub fn spawn_notifier<N: Notifier>(notifier: N) -> (NotifyHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                NotifyEvent::Opened(incident) => notifier.notify_incident(&incident).await,
                NotifyEvent::Resolved(incident) => notifier.notify_recovery(&incident).await,
            }
        }
        debug!("notifier delivery loop ended");
    });
    (NotifyHandle { tx }, task)
}
