use crate::k8s::cache::{ObjectKey, ResourceType};
use derive_more::From;
use k8s_openapi::serde_json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    HttpHeader(hyper::http::Error),

    #[from]
    Io(std::io::Error),

    /// Nothing is cached under this key, or the type was never registered
    NotFound {
        resource: ResourceType,
        key: ObjectKey,
    },

    /// Listener registration and `start()` are only valid before the cache starts
    AlreadyStarted,

    /// The first full list of a resource type failed; the cache never becomes ready
    InitialList {
        resource: ResourceType,
        message: String,
    },

    /// A lock was poisoned by a panic while held
    LockPoisoned(String),

    /// Custom error message
    Custom(String),
}

impl Error {
    /// True when the remote store reports that a resume token is too old (HTTP 410)
    #[must_use]
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(resp)) if resp.code == 410)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::NotFound { resource, key } => Self::NotFound {
                resource: resource.clone(),
                key: key.clone(),
            },
            Self::AlreadyStarted => Self::AlreadyStarted,
            Self::InitialList { resource, message } => Self::InitialList {
                resource: resource.clone(),
                message: message.clone(),
            },
            Self::LockPoisoned(message) => Self::LockPoisoned(message.clone()),
            Self::Custom(message) => Self::Custom(message.clone()),
            other => Self::Custom(other.to_string()),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::NotFound { resource, key } => write!(fmt, "{resource} {key} not found in cache"),
            Self::AlreadyStarted => write!(fmt, "cache already started"),
            Self::InitialList { resource, message } => {
                write!(fmt, "initial list of {resource} failed: {message}")
            }
            Self::LockPoisoned(message) => write!(
                fmt,
                "{message} - this indicates a prior panic, cache may be in an inconsistent state"
            ),
            Self::Custom(message) => write!(fmt, "{message}"),
            other => write!(fmt, "{other:?}"),
        }
    }
}

impl std::error::Error for Error {}
