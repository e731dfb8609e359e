/**
 * Resource client backed by a live API server
 *
 * Resolves (apiVersion, kind) through discovery, lists with `Api<DynamicObject>`
 * and opens watch streams directly by path.
 */
use super::cache::config::{CacheConfig, WATCH_TIMEOUT_SECONDS};
use super::cache::event::{EventKind, WatchEnvelope};
use super::cache::resource::ResourceType;
use super::cache::source::{ListResult, ResourceClient, WatchStream};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::serde_json::{self, json};
use kube::api::{Api, ApiResource, DynamicObject, ListParams, WatchEvent, WatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::Scope;
use kube::Client;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct Resolved {
    api_resource: ApiResource,
    namespaced: bool,
}

pub struct KubeResourceClient {
    client: Client,
    namespace: Option<String>,
    watch_timeout_secs: u32,
    resolved: RwLock<HashMap<ResourceType, Resolved>>,
}

impl KubeResourceClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            namespace: None,
            watch_timeout_secs: WATCH_TIMEOUT_SECONDS,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Applies the namespace scope and watch timeout from `config`
    #[must_use]
    pub fn from_config(client: Client, config: &CacheConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            watch_timeout_secs: config.watch_timeout_secs,
            ..Self::new(client)
        }
    }

    /// Skips discovery for `resource` by supplying its API resource up front
    pub async fn register_api_resource(
        &self,
        resource: &ResourceType,
        api_resource: ApiResource,
        namespaced: bool,
    ) {
        self.resolved.write().await.insert(
            resource.clone(),
            Resolved {
                api_resource,
                namespaced,
            },
        );
    }

    async fn resolve(&self, resource: &ResourceType) -> Result<Resolved> {
        if let Some(found) = self.resolved.read().await.get(resource) {
            return Ok(found.clone());
        }

        debug!("🔧 Discovering {}", resource);
        let gvk = GroupVersionKind::gvk(resource.group(), resource.version(), resource.kind());
        let (api_resource, capabilities) = kube::discovery::pinned_kind(&self.client, &gvk).await?;
        let resolved = Resolved {
            api_resource,
            namespaced: matches!(capabilities.scope, Scope::Namespaced),
        };
        self.resolved
            .write()
            .await
            .insert(resource.clone(), resolved.clone());
        Ok(resolved)
    }

    fn scoped_namespace(&self, resolved: &Resolved) -> Option<&str> {
        if resolved.namespaced {
            self.namespace.as_deref()
        } else {
            None
        }
    }

    fn api(&self, resolved: &Resolved) -> Api<DynamicObject> {
        match self.scoped_namespace(resolved) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resolved.api_resource),
            None => Api::all_with(self.client.clone(), &resolved.api_resource),
        }
    }
}

/// URL path of a resource collection, optionally scoped to a namespace
#[must_use]
pub fn collection_path(api_resource: &ApiResource, namespace: Option<&str>) -> String {
    let base = if api_resource.group.is_empty() {
        format!("/api/{}", api_resource.version)
    } else {
        format!("/apis/{}/{}", api_resource.group, api_resource.version)
    };
    match namespace {
        Some(ns) => format!("{base}/namespaces/{ns}/{}", api_resource.plural),
        None => format!("{base}/{}", api_resource.plural),
    }
}

fn to_envelope(event: WatchEvent<DynamicObject>) -> Result<WatchEnvelope> {
    match event {
        WatchEvent::Added(obj) => WatchEnvelope::from_object(&EventKind::Added, &obj),
        WatchEvent::Modified(obj) => WatchEnvelope::from_object(&EventKind::Modified, &obj),
        WatchEvent::Deleted(obj) => WatchEnvelope::from_object(&EventKind::Deleted, &obj),
        WatchEvent::Bookmark(bookmark) => Ok(WatchEnvelope::new(
            &EventKind::Bookmark,
            json!({"metadata": {"resourceVersion": bookmark.metadata.resource_version}}),
        )),
        WatchEvent::Error(status) => Ok(WatchEnvelope::new(
            &EventKind::Error,
            serde_json::to_value(&status)?,
        )),
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn list(&self, resource: &ResourceType) -> Result<ListResult> {
        let resolved = self.resolve(resource).await?;
        let list = self.api(&resolved).list(&ListParams::default()).await?;
        Ok(ListResult {
            resource_version: list.metadata.resource_version,
            items: list.items,
        })
    }

    async fn resolve_path(&self, resource: &ResourceType) -> Result<String> {
        let resolved = self.resolve(resource).await?;
        Ok(collection_path(
            &resolved.api_resource,
            self.scoped_namespace(&resolved),
        ))
    }

    async fn open_stream(&self, path: &str, resume_from: Option<&str>) -> Result<WatchStream> {
        // Bookmarks are on by default in WatchParams
        let wp = WatchParams::default().timeout(self.watch_timeout_secs);
        let request = kube::core::Request::new(path)
            .watch(&wp, resume_from.unwrap_or("0"))
            .map_err(kube::Error::BuildRequest)?;
        let events = self
            .client
            .request_events::<DynamicObject>(request)
            .await?;
        Ok(events
            .map(|item| item.map_err(Error::from).and_then(to_envelope))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::http::{Request, Response};
    use k8s_openapi::api::core::v1::Pod;
    use kube::client::Body;

    fn pods() -> ResourceType {
        ResourceType::new("v1", "Pod")
    }

    async fn mocked(
        namespace: Option<&str>,
    ) -> (
        KubeResourceClient,
        tower_test::mock::Handle<Request<Body>, Response<Body>>,
    ) {
        let (service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let client = Client::new(service, "default");
        let mut config = CacheConfig::default();
        if let Some(ns) = namespace {
            config = config.with_namespace(ns);
        }
        let kube_client = KubeResourceClient::from_config(client, &config);
        kube_client
            .register_api_resource(&pods(), ApiResource::erase::<Pod>(&()), true)
            .await;
        (kube_client, handle)
    }

    #[test]
    fn test_collection_paths() {
        let core = ApiResource::erase::<Pod>(&());
        assert_eq!(collection_path(&core, None), "/api/v1/pods");
        assert_eq!(
            collection_path(&core, Some("team-a")),
            "/api/v1/namespaces/team-a/pods"
        );

        let gvk = GroupVersionKind::gvk("apps", "v1", "Deployment");
        let apps = ApiResource::from_gvk_with_plural(&gvk, "deployments");
        assert_eq!(collection_path(&apps, None), "/apis/apps/v1/deployments");
    }

    #[tokio::test]
    async fn test_resolve_path_respects_namespace_scope() {
        let (client, _handle) = mocked(Some("team-a")).await;
        let path = client.resolve_path(&pods()).await.unwrap();
        assert_eq!(path, "/api/v1/namespaces/team-a/pods");
    }

    #[tokio::test]
    async fn test_list_returns_items_and_cursor() {
        let (client, mut handle) = mocked(None).await;
        let server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("list not called");
            assert_eq!(request.uri().path(), "/api/v1/pods");
            let body = json!({
                "apiVersion": "v1",
                "kind": "PodList",
                "metadata": {"resourceVersion": "123"},
                "items": [{
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": {"name": "web", "namespace": "default", "resourceVersion": "100"}
                }]
            });
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            );
        });

        let listed = client.list(&pods()).await.unwrap();
        server.await.unwrap();
        assert_eq!(listed.resource_version.as_deref(), Some("123"));
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].metadata.name.as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn test_open_stream_yields_envelopes() {
        let (client, mut handle) = mocked(None).await;
        let server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("watch not called");
            assert_eq!(request.uri().path(), "/api/v1/pods");
            let query = request.uri().query().unwrap_or_default().to_string();
            assert!(query.contains("watch=true"));
            assert!(query.contains("resourceVersion=5"));
            assert!(query.contains("allowWatchBookmarks=true"));
            assert!(query.contains("timeoutSeconds=294"));

            let added = json!({"type": "ADDED", "object": {
                "apiVersion": "v1", "kind": "Pod",
                "metadata": {"name": "web", "namespace": "default", "resourceVersion": "6"}
            }});
            let expired = json!({"type": "ERROR", "object": {
                "apiVersion": "v1", "kind": "Status", "metadata": {},
                "status": "Failure", "message": "too old resource version",
                "reason": "Expired", "code": 410
            }});
            let body = format!("{added}\n{expired}\n");
            send.send_response(Response::builder().body(Body::from(body.into_bytes())).unwrap());
        });

        let stream = client.open_stream("/api/v1/pods", Some("5")).await.unwrap();
        let envelopes: Vec<WatchEnvelope> = stream.map(|item| item.unwrap()).collect().await;
        server.await.unwrap();

        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].kind(), EventKind::Added);
        assert_eq!(envelopes[0].resource_version(), Some("6"));
        assert_eq!(envelopes[1].kind(), EventKind::Error);
        let status: crate::k8s::cache::StatusObject =
            serde_json::from_value(envelopes[1].object.clone()).unwrap();
        assert!(status.is_expired());
    }
}
