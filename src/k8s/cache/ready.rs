/**
 * Cache-wide readiness: every registered type has completed its first list
 */
use super::resource::ResourceType;
use crate::error::{Error, Result};
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct ReadyState {
    started: bool,
    pending: HashSet<ResourceType>,
    failure: Option<Error>,
}

impl ReadyState {
    fn settled(&self) -> bool {
        self.failure.is_some() || (self.started && self.pending.is_empty())
    }
}

#[derive(Debug)]
pub(crate) struct Readiness {
    tx: watch::Sender<ReadyState>,
}

impl Readiness {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadyState::default());
        Self { tx }
    }

    /// Arms the signal with the types whose first list is awaited
    pub(crate) fn begin<'a>(&self, types: impl IntoIterator<Item = &'a ResourceType>) {
        let pending: HashSet<ResourceType> = types.into_iter().cloned().collect();
        self.tx.send_modify(|state| {
            state.started = true;
            state.pending = pending;
        });
    }

    pub(crate) fn mark_listed(&self, resource: &ResourceType) {
        self.tx.send_modify(|state| {
            if state.pending.remove(resource) {
                debug!("✅ {} synced, {} type(s) pending", resource, state.pending.len());
            }
        });
    }

    pub(crate) fn mark_failed(&self, error: Error) {
        self.tx.send_modify(|state| {
            if state.failure.is_none() {
                state.failure = Some(error);
            }
        });
    }

    pub(crate) fn is_ready(&self) -> bool {
        let state = self.tx.borrow();
        state.failure.is_none() && state.started && state.pending.is_empty()
    }

    /// Resolves once all types have listed, or with the first initial-list failure
    pub(crate) async fn wait(&self) -> Result<()> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(ReadyState::settled)
            .await
            .map_err(|_| Error::Custom("cache dropped before becoming ready".to_string()))?;
        state.failure.clone().map_or(Ok(()), Err)
    }
}
