pub mod cache;
pub mod client;
pub mod kube_client;

/// Default user agent for `StateMirror` - automatically uses the package version
///
/// Can be overridden via the `STATEMIRROR_USER_AGENT` environment variable,
/// see [`client::user_agent`].
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
