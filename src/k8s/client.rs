// Client creation with custom user-agent support for kube 2.x
use super::USER_AGENT;
use crate::error::Result as SmResult;
use hyper::http::{HeaderName, HeaderValue};
use kube::{Client, Config};
use tracing::warn;

/// Environment variable that overrides the default user agent
pub const USER_AGENT_ENV: &str = "STATEMIRROR_USER_AGENT";

/// User agent to send: the env override if set and non-empty, else [`USER_AGENT`]
#[must_use]
pub fn user_agent() -> String {
    std::env::var(USER_AGENT_ENV)
        .ok()
        .filter(|ua| !ua.trim().is_empty())
        .unwrap_or_else(|| USER_AGENT.to_string())
}

/// Adds a `user-agent` header to `config`. Returns false, leaving the config
/// untouched, if the value is not a valid header.
pub fn add_user_agent_header(config: &mut Config, user_agent: &str) -> bool {
    match HeaderValue::from_str(user_agent) {
        Ok(header_value) => {
            config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value));
            true
        }
        Err(_) => {
            warn!("Ignoring invalid user agent {:?}", user_agent);
            false
        }
    }
}

/// Create a new k8s client to interact with k8s cluster api
///
/// # Errors
///
/// Will return `Err` if no kubeconfig or in-cluster config can be inferred
pub async fn new(custom_user_agent: Option<&str>) -> SmResult<Client> {
    let mut config = Config::infer().await?;

    let agent = custom_user_agent.map_or_else(user_agent, str::to_string);
    add_user_agent_header(&mut config, &agent);

    let client = Client::try_from(config)?;

    Ok(client)
}
