use super::event::{EventKind, WatchEnvelope};
use super::resource::ResourceType;
use async_trait::async_trait;
use futures::FutureExt;
use kube::api::DynamicObject;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// One event as handed to listeners, borrowed from the sync loop
#[derive(Debug, Clone, Copy)]
pub struct WatchNotification<'a> {
    pub resource: &'a ResourceType,
    pub kind: &'a EventKind,
    /// The object the event carries; `None` for bookmarks and status events
    pub object: Option<&'a Arc<DynamicObject>>,
    pub envelope: &'a WatchEnvelope,
}

impl WatchNotification<'_> {
    #[must_use]
    pub fn to_update(&self) -> CacheUpdate {
        CacheUpdate {
            resource: self.resource.clone(),
            kind: self.kind.clone(),
            object: self.object.cloned(),
            envelope: self.envelope.clone(),
        }
    }
}

/// Receives every event for the types it was registered for, in stream order.
///
/// Awaited inline by the type's sync loop: the next event is not applied
/// until every listener has returned, so a slow listener holds back its type.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// # Errors
    ///
    /// A returned error is logged; it does not stop other listeners or the stream
    async fn on_event(&self, event: &WatchNotification<'_>) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> EventListener for F
where
    F: Fn(&WatchNotification<'_>) -> anyhow::Result<()> + Send + Sync,
{
    async fn on_event(&self, event: &WatchNotification<'_>) -> anyhow::Result<()> {
        self(event)
    }
}

pub type SharedListener = Arc<dyn EventListener>;

/// Wraps a closure as a listener
pub fn from_fn<F>(f: F) -> SharedListener
where
    F: Fn(&WatchNotification<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Owned copy of a [`WatchNotification`]
#[derive(Debug, Clone)]
pub struct CacheUpdate {
    pub resource: ResourceType,
    pub kind: EventKind,
    pub object: Option<Arc<DynamicObject>>,
    pub envelope: WatchEnvelope,
}

/// Forwards events into a bounded channel, waiting for room when it is full
pub struct ChannelListener {
    id: Uuid,
    sender: mpsc::Sender<CacheUpdate>,
}

impl ChannelListener {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CacheUpdate>) {
        let (sender, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                sender,
            },
            rx,
        )
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

#[async_trait]
impl EventListener for ChannelListener {
    async fn on_event(&self, event: &WatchNotification<'_>) -> anyhow::Result<()> {
        let update = event.to_update();
        if self.sender.send(update).await.is_err() {
            // Receiver dropped, nobody is listening any more
            debug!("🔍 Subscriber {} is gone", self.id);
        }
        Ok(())
    }
}

/// Invokes every listener in order, isolating failures and panics.
/// Returns how many listeners failed.
pub(crate) async fn notify_all(
    listeners: &[SharedListener],
    event: &WatchNotification<'_>,
) -> usize {
    let mut failures = 0;
    for (position, listener) in listeners.iter().enumerate() {
        match AssertUnwindSafe(listener.on_event(event)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                warn!(
                    "⚠️  Listener #{} failed on {} {}: {:#}",
                    position, event.kind, event.resource, e
                );
            }
            Err(_) => {
                failures += 1;
                error!(
                    "❌ Listener #{} panicked on {} {}",
                    position, event.kind, event.resource
                );
            }
        }
    }
    failures
}
