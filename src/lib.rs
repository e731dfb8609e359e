//! A local, watch-driven mirror of Kubernetes resources.
//!
//! Each registered resource type is listed once, then kept current from a
//! watch stream. Controllers read the in-memory index and receive every
//! change through listeners.
pub mod error;
pub mod k8s;

pub use error::{Error, Result};
