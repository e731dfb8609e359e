use super::event::WatchEnvelope;
use super::resource::ResourceType;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use kube::api::DynamicObject;

/// A change-notification stream. The stream ending, or yielding an error,
/// is its single terminal notification.
pub type WatchStream = BoxStream<'static, Result<WatchEnvelope>>;

/// Authoritative snapshot of one resource type
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    pub items: Vec<DynamicObject>,
    /// Cursor to resume watching from, if the store issued one
    pub resource_version: Option<String>,
}

/// The remote store as seen by the cache
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Full, unfiltered list of a resource type
    async fn list(&self, resource: &ResourceType) -> Result<ListResult>;

    /// Stable path at which a stream for the type can be opened
    async fn resolve_path(&self, resource: &ResourceType) -> Result<String>;

    /// Opens a stream at `path`, resuming after `resume_from` when given
    async fn open_stream(&self, path: &str, resume_from: Option<&str>) -> Result<WatchStream>;
}
