#![allow(dead_code)]
// Scripted in-memory stand-in for the API server
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::serde_json::{self, json};
use kube::api::DynamicObject;
use statemirror::k8s::cache::{
    EventKind, ListResult, ResourceClient, ResourceType, WatchEnvelope, WatchStream,
};
use statemirror::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(ResourceType),
    Open { path: String, resume_from: Option<String> },
}

pub enum ListScript {
    Respond(Result<ListResult>),
    /// Never answers
    Hang,
}

pub enum StreamScript {
    /// Delivers the items, then ends
    Finite(Vec<Result<WatchEnvelope>>),
    /// Fed by the test through a sender
    Live(mpsc::Receiver<Result<WatchEnvelope>>),
    /// Opening fails
    OpenError(Error),
}

#[derive(Default)]
pub struct FakeCluster {
    lists: Mutex<HashMap<ResourceType, VecDeque<ListScript>>>,
    streams: Mutex<HashMap<String, VecDeque<StreamScript>>>,
    calls: Mutex<Vec<Call>>,
}

pub fn path_of(resource: &ResourceType) -> String {
    format!("/fake/{}/{}", resource.api_version(), resource.kind())
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_list(&self, resource: &ResourceType, script: ListScript) {
        self.lists
            .lock()
            .unwrap()
            .entry(resource.clone())
            .or_default()
            .push_back(script);
    }

    pub fn list_ok(&self, resource: &ResourceType, items: Vec<DynamicObject>, rv: &str) {
        self.on_list(
            resource,
            ListScript::Respond(Ok(ListResult {
                items,
                resource_version: Some(rv.to_string()),
            })),
        );
    }

    pub fn on_stream(&self, resource: &ResourceType, script: StreamScript) {
        self.streams
            .lock()
            .unwrap()
            .entry(path_of(resource))
            .or_default()
            .push_back(script);
    }

    pub fn stream_events(&self, resource: &ResourceType, events: Vec<WatchEnvelope>) {
        self.on_stream(resource, StreamScript::Finite(events.into_iter().map(Ok).collect()));
    }

    pub fn live_stream(&self, resource: &ResourceType) -> mpsc::Sender<Result<WatchEnvelope>> {
        let (tx, rx) = mpsc::channel(64);
        self.on_stream(resource, StreamScript::Live(rx));
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_calls(&self, resource: &ResourceType) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::List(rt) if rt == resource))
            .count()
    }

    pub fn opens(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Open { resume_from, .. } => Some(resume_from),
                Call::List(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ResourceClient for FakeCluster {
    async fn list(&self, resource: &ResourceType) -> Result<ListResult> {
        self.calls.lock().unwrap().push(Call::List(resource.clone()));
        let script = self
            .lists
            .lock()
            .unwrap()
            .get_mut(resource)
            .and_then(VecDeque::pop_front);
        match script {
            Some(ListScript::Respond(result)) => result,
            Some(ListScript::Hang) | None => futures::future::pending().await,
        }
    }

    async fn resolve_path(&self, resource: &ResourceType) -> Result<String> {
        Ok(path_of(resource))
    }

    async fn open_stream(&self, path: &str, resume_from: Option<&str>) -> Result<WatchStream> {
        self.calls.lock().unwrap().push(Call::Open {
            path: path.to_string(),
            resume_from: resume_from.map(str::to_string),
        });
        let script = self
            .streams
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        match script {
            Some(StreamScript::Finite(items)) => Ok(futures::stream::iter(items).boxed()),
            Some(StreamScript::Live(rx)) => Ok(ReceiverStream::new(rx).boxed()),
            Some(StreamScript::OpenError(e)) => Err(e),
            // Out of script: stay connected and quiet
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}

pub fn configmaps() -> ResourceType {
    ResourceType::new("v1", "ConfigMap")
}

pub fn secrets() -> ResourceType {
    ResourceType::new("v1", "Secret")
}

pub fn cm_json(name: &str, value: &str, rv: &str) -> serde_json::Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name, "namespace": "default", "resourceVersion": rv},
        "data": {"value": value}
    })
}

pub fn cm(name: &str, value: &str, rv: &str) -> DynamicObject {
    serde_json::from_value(cm_json(name, value, rv)).unwrap()
}

pub fn event(kind: &EventKind, name: &str, value: &str, rv: &str) -> WatchEnvelope {
    WatchEnvelope::new(kind, cm_json(name, value, rv))
}

pub fn bookmark(rv: &str) -> WatchEnvelope {
    WatchEnvelope::new(
        &EventKind::Bookmark,
        json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"resourceVersion": rv}}),
    )
}

pub fn status_event(code: u16, reason: &str) -> WatchEnvelope {
    WatchEnvelope::new(
        &EventKind::Error,
        json!({"kind": "Status", "apiVersion": "v1", "status": "Failure",
               "code": code, "reason": reason, "message": "from test"}),
    )
}

pub fn value_of(obj: &DynamicObject) -> String {
    obj.data["data"]["value"].as_str().unwrap_or_default().to_string()
}

/// Polls `check` until it holds, panicking after two seconds
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
