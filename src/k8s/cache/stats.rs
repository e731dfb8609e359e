use super::resource::ResourceType;
use std::fmt;

/// Lifecycle of one type's sync loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynced,
    Listing,
    Streaming,
    Relisting,
    /// The first list failed; the loop has stopped
    Terminated,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unsynced => "unsynced",
            Self::Listing => "listing",
            Self::Streaming => "streaming",
            Self::Relisting => "relisting",
            Self::Terminated => "terminated",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct SyncStats {
    pub resource: ResourceType,
    pub state: SyncState,
    pub resume_token: Option<String>,
    pub objects: usize,
    pub lists: u64,
    pub events_applied: u64,
    pub reconnects: u64,
    pub listener_failures: u64,
    pub last_error: Option<String>,
}

impl SyncStats {
    #[must_use]
    pub fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            state: SyncState::Unsynced,
            resume_token: None,
            objects: 0,
            lists: 0,
            events_applied: 0,
            reconnects: 0,
            listener_failures: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub started: bool,
    pub types: Vec<SyncStats>,
}

impl CacheStats {
    #[must_use]
    pub fn total_objects(&self) -> usize {
        self.types.iter().map(|t| t.objects).sum()
    }

    #[must_use]
    pub fn streaming_types(&self) -> usize {
        self.types
            .iter()
            .filter(|t| t.state == SyncState::Streaming)
            .count()
    }

    #[must_use]
    pub fn get(&self, resource: &ResourceType) -> Option<&SyncStats> {
        self.types.iter().find(|t| &t.resource == resource)
    }
}
