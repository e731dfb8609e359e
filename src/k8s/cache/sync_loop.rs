/**
 * Per-type synchronization loop
 *
 * list → stream → (expired cursor) relist → stream → ...
 *
 * The loop exclusively owns its type's store and metadata. A failed first
 * list is fatal and reported through readiness; everything afterwards is
 * retried forever. A stream the server closes cleanly is reopened at once;
 * only faults back off.
 */
use super::config::BackoffPolicy;
use super::event::{decode, Decoded, EventKind, WatchEnvelope};
use super::index::{Snapshot, TypeStore};
use super::listener::{notify_all, SharedListener, WatchNotification};
use super::ready::Readiness;
use super::registry::TypeMetadata;
use super::resource::{ObjectKey, ResourceType};
use super::source::ResourceClient;
use super::stats::{SyncState, SyncStats};
use crate::error::{Error, Result};
use futures::StreamExt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// How a single stream came to an end
#[derive(Debug)]
enum StreamOutcome {
    /// The cursor was compacted away; a relist is required
    Expired,
    /// The remote side closed the stream
    Closed { delivered: u64 },
    /// Opening or reading the stream failed
    Failed { delivered: u64, error: Error },
}

/// Whether to keep reading after applying an event
#[derive(Debug, PartialEq, Eq)]
enum Applied {
    Continue,
    Expired,
}

pub(crate) struct SyncLoop {
    resource: ResourceType,
    client: Arc<dyn ResourceClient>,
    store: Arc<TypeStore>,
    listeners: Arc<[SharedListener]>,
    stats: Arc<RwLock<SyncStats>>,
    backoff: BackoffPolicy,
    metadata: TypeMetadata,
}

impl SyncLoop {
    pub(crate) fn new(
        resource: ResourceType,
        client: Arc<dyn ResourceClient>,
        store: Arc<TypeStore>,
        listeners: Vec<SharedListener>,
        stats: Arc<RwLock<SyncStats>>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            resource,
            client,
            store,
            listeners: listeners.into(),
            stats,
            backoff,
            metadata: TypeMetadata::default(),
        }
    }

    /// Drives the type until the task is aborted
    pub(crate) async fn run(mut self, readiness: Arc<Readiness>) {
        info!("🔍 Starting {} sync", self.resource);

        self.set_state(SyncState::Listing);
        if let Err(e) = self.list().await {
            error!("❌ Initial list of {} failed: {}", self.resource, e);
            self.record_error(&e);
            self.set_state(SyncState::Terminated);
            readiness.mark_failed(Error::InitialList {
                resource: self.resource.clone(),
                message: e.to_string(),
            });
            return;
        }
        readiness.mark_listed(&self.resource);

        let mut attempt = 0;
        loop {
            if self.metadata.resume_token.is_none() {
                self.set_state(SyncState::Relisting);
                if let Err(e) = self.list().await {
                    warn!("❌ Relist of {} failed: {}", self.resource, e);
                    self.record_error(&e);
                    self.pause(&mut attempt).await;
                    continue;
                }
                attempt = 0;
            }

            self.set_state(SyncState::Streaming);
            match self.stream().await {
                StreamOutcome::Expired => {
                    info!("⌛ {} resume token expired, relisting", self.resource);
                    self.metadata.resume_token = None;
                    self.update_stats(|stats| stats.resume_token = None);
                }
                StreamOutcome::Closed { delivered } => {
                    debug!("🔍 {} stream ended after {} events, reconnecting", self.resource, delivered);
                    attempt = 0;
                    tokio::task::yield_now().await;
                }
                StreamOutcome::Failed { delivered, error } => {
                    warn!("❌ {} stream failed after {} events: {}", self.resource, delivered, error);
                    self.record_error(&error);
                    if delivered > 0 {
                        attempt = 0;
                    }
                    self.pause(&mut attempt).await;
                }
            }
            self.update_stats(|stats| stats.reconnects += 1);
        }
    }

    /// Full list: replaces the type's entries and records the cursor and path.
    /// Listeners see a `DELETED` for every object the list dropped, then an
    /// `ADDED` for every listed object.
    async fn list(&mut self) -> Result<()> {
        let listed = self.client.list(&self.resource).await?;
        if self.metadata.path.is_none() {
            self.metadata.path = Some(self.client.resolve_path(&self.resource).await?);
        }

        let removed = self.store.replace_all(listed.items)?;
        let count = self.store.len()?;
        self.metadata.resume_token = listed.resource_version;
        info!(
            "📋 Listed {} {} (resourceVersion {})",
            count,
            self.resource,
            self.metadata.resume_token.as_deref().unwrap_or("-")
        );

        let token = self.metadata.resume_token.clone();
        self.update_stats(|stats| {
            stats.lists += 1;
            stats.objects = count;
            stats.resume_token = token;
        });

        if !removed.is_empty() {
            debug!("🗑️  Relist of {} dropped {} object(s)", self.resource, removed.len());
        }
        self.replay(&EventKind::Deleted, removed).await?;
        self.replay(&EventKind::Added, self.store.snapshot()?).await
    }

    async fn replay(&self, kind: &EventKind, snapshots: Vec<Snapshot>) -> Result<()> {
        for snapshot in snapshots {
            let envelope = WatchEnvelope::from_object(kind, &snapshot)?;
            self.notify(kind, Some(&snapshot), &envelope).await;
        }
        Ok(())
    }

    /// Opens one stream at the stored cursor and applies events until it ends
    async fn stream(&mut self) -> StreamOutcome {
        let Some(path) = self.metadata.path.clone() else {
            return StreamOutcome::Failed {
                delivered: 0,
                error: Error::Custom(format!("no stream path resolved for {}", self.resource)),
            };
        };

        let opened = self
            .client
            .open_stream(&path, self.metadata.resume_token.as_deref())
            .await;
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) if e.is_gone() => return StreamOutcome::Expired,
            Err(e) => return StreamOutcome::Failed { delivered: 0, error: e },
        };
        debug!(
            "📡 Watching {} at {} from {}",
            self.resource,
            path,
            self.metadata.resume_token.as_deref().unwrap_or("-")
        );

        let mut delivered = 0;
        while let Some(item) = stream.next().await {
            let envelope = match item {
                Ok(envelope) => envelope,
                Err(e) if e.is_gone() => return StreamOutcome::Expired,
                Err(e) => return StreamOutcome::Failed { delivered, error: e },
            };
            delivered += 1;
            if self.apply(&envelope).await == Applied::Expired {
                return StreamOutcome::Expired;
            }
        }
        StreamOutcome::Closed { delivered }
    }

    /// Applies one event: cursor, then index, then listeners
    async fn apply(&mut self, envelope: &WatchEnvelope) -> Applied {
        let kind = envelope.kind();
        let decoded = match decode(envelope) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("⚠️  Skipping undecodable {} event for {}: {}", kind, self.resource, e);
                return Applied::Continue;
            }
        };

        if let Some(rv) = decoded.resource_version() {
            self.metadata.resume_token = Some(rv);
        }

        let object: Option<Snapshot> = match decoded {
            Decoded::Upsert(obj) => {
                debug!("📝 {} {} {}", kind, self.resource, ObjectKey::from_object(&obj));
                match self.store.upsert(*obj) {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        error!("❌ Failed to store {} event for {}: {}", kind, self.resource, e);
                        return Applied::Continue;
                    }
                }
            }
            Decoded::Delete(obj) => {
                let key = ObjectKey::from_object(&obj);
                debug!("🗑️  {} {} {}", kind, self.resource, key);
                if let Err(e) = self.store.remove(&key) {
                    error!("❌ Failed to remove {} {}: {}", self.resource, key, e);
                    return Applied::Continue;
                }
                Some(Arc::new(*obj))
            }
            Decoded::Bookmark { .. } => None,
            Decoded::Status(status) if status.is_expired() => return Applied::Expired,
            Decoded::Status(status) => {
                warn!(
                    "⚠️  {} stream reported status {} {}: {}",
                    self.resource, status.code, status.reason, status.message
                );
                None
            }
            Decoded::Unrecognized(event_type) => {
                warn!("⚠️  Ignoring unrecognized event type '{}' for {}", event_type, self.resource);
                return Applied::Continue;
            }
        };

        let token = self.metadata.resume_token.clone();
        let objects = self.store.len().unwrap_or_default();
        self.update_stats(|stats| {
            stats.events_applied += 1;
            stats.resume_token = token;
            stats.objects = objects;
        });

        self.notify(&kind, object.as_ref(), envelope).await;
        Applied::Continue
    }

    async fn notify(&self, kind: &EventKind, object: Option<&Snapshot>, envelope: &WatchEnvelope) {
        if self.listeners.is_empty() {
            return;
        }
        let event = WatchNotification {
            resource: &self.resource,
            kind,
            object,
            envelope,
        };
        let failures = notify_all(&self.listeners, &event).await;
        if failures > 0 {
            self.update_stats(|stats| stats.listener_failures += failures as u64);
        }
    }

    async fn pause(&self, attempt: &mut u32) {
        let delay = self.backoff.delay(*attempt);
        *attempt = attempt.saturating_add(1);
        if delay > Duration::ZERO {
            warn!("⏳ Retrying {} in {:?} (attempt {})", self.resource, delay, attempt);
            sleep(delay).await;
        } else {
            // let other tasks run between immediate retries
            tokio::task::yield_now().await;
        }
    }

    fn set_state(&self, state: SyncState) {
        self.update_stats(|stats| stats.state = state);
    }

    fn record_error(&self, error: &Error) {
        let message = error.to_string();
        self.update_stats(|stats| stats.last_error = Some(message));
    }

    fn update_stats(&self, f: impl FnOnce(&mut SyncStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }
}
