pub mod config;
pub mod event;
pub mod index;
pub mod listener;
mod ready;
pub mod registry;
pub mod resource;
pub mod source;
pub mod stats;
mod sync_loop;
pub mod watch_cache;

pub use config::{BackoffPolicy, CacheConfig};
pub use event::{EventKind, StatusObject, WatchEnvelope};
pub use index::{ObjectIndex, Snapshot, TypeStore};
pub use listener::{from_fn, CacheUpdate, ChannelListener, EventListener, SharedListener, WatchNotification};
pub use registry::{ResourceRegistry, TypeMetadata};
pub use resource::{ObjectKey, ResourceType};
pub use source::{ListResult, ResourceClient, WatchStream};
pub use stats::{CacheStats, SyncState, SyncStats};
pub use watch_cache::{WatchCache, WatchCacheHandle};
