/**
 * Change-notification events as delivered by a watch stream
 */
use crate::error::Result;
use k8s_openapi::serde_json::{self, Value};
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP status used by the API server when a resume token has been compacted away
pub const EXPIRED_CODE: u16 = 410;
/// Status reason accompanying [`EXPIRED_CODE`]
pub const EXPIRED_REASON: &str = "Expired";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
    Unknown(String),
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Bookmark => "BOOKMARK",
            Self::Error => "ERROR",
            Self::Unknown(other) => other,
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "ADDED" => Self::Added,
            "MODIFIED" => Self::Modified,
            "DELETED" => Self::Deleted,
            "BOOKMARK" => Self::Bookmark,
            "ERROR" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw `{"type": ..., "object": ...}` frame of a watch stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub object: Value,
}

impl WatchEnvelope {
    #[must_use]
    pub fn new(kind: &EventKind, object: Value) -> Self {
        Self {
            event_type: kind.as_str().to_string(),
            object,
        }
    }

    /// Builds an envelope around a typed object
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be serialized
    pub fn from_object(kind: &EventKind, obj: &DynamicObject) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(obj)?))
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from(self.event_type.as_str())
    }

    /// `metadata.resourceVersion` of the carried object, if any
    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.object
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .filter(|rv| !rv.is_empty())
    }
}

/// The `Status` payload of an `ERROR` event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusObject {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub code: u16,
}

impl StatusObject {
    #[must_use]
    pub fn expired(message: impl Into<String>) -> Self {
        Self {
            status: "Failure".to_string(),
            message: message.into(),
            reason: EXPIRED_REASON.to_string(),
            code: EXPIRED_CODE,
        }
    }

    /// The resume token is too old to continue from
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.code == EXPIRED_CODE && self.reason == EXPIRED_REASON
    }
}

/// What the sync loop should do with one envelope
#[derive(Debug, Clone)]
pub enum Decoded {
    Upsert(Box<DynamicObject>),
    Delete(Box<DynamicObject>),
    Bookmark { resource_version: Option<String> },
    Status(StatusObject),
    Unrecognized(String),
}

impl Decoded {
    /// Cursor carried by the event, if it advances the resume token
    #[must_use]
    pub fn resource_version(&self) -> Option<String> {
        match self {
            Self::Upsert(obj) | Self::Delete(obj) => obj.resource_version(),
            Self::Bookmark { resource_version } => resource_version.clone(),
            Self::Status(_) | Self::Unrecognized(_) => None,
        }
    }
}

/// Classifies an envelope by its event type and decodes its payload
///
/// # Errors
///
/// Returns an error if the payload does not match the shape its type requires
pub fn decode(envelope: &WatchEnvelope) -> Result<Decoded> {
    let decoded = match envelope.kind() {
        EventKind::Added | EventKind::Modified => {
            Decoded::Upsert(Box::new(serde_json::from_value(envelope.object.clone())?))
        }
        EventKind::Deleted => {
            Decoded::Delete(Box::new(serde_json::from_value(envelope.object.clone())?))
        }
        EventKind::Bookmark => Decoded::Bookmark {
            resource_version: envelope.resource_version().map(str::to_string),
        },
        EventKind::Error => Decoded::Status(serde_json::from_value(envelope.object.clone())?),
        EventKind::Unknown(other) => Decoded::Unrecognized(other),
    };
    Ok(decoded)
}
