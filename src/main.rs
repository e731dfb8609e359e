use clap::Parser;
use statemirror::k8s::cache::{
    from_fn, BackoffPolicy, CacheConfig, ResourceType, WatchCache, WatchNotification,
};
use statemirror::k8s::client;
use statemirror::k8s::kube_client::KubeResourceClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Resource type to mirror as <apiVersion>:<Kind>, e.g. apps/v1:Deployment (repeatable)
    #[arg(short, long = "resource", required = true, value_parser = parse_resource)]
    resources: Vec<ResourceType>,

    /// Only mirror objects in this namespace
    #[arg(short, long)]
    namespace: Option<String>,

    /// Give up if the initial lists have not completed within this many seconds
    #[arg(long, default_value_t = 60)]
    ready_timeout_secs: u64,

    /// Reconnect immediately after faults instead of backing off
    #[arg(long)]
    immediate_retry: bool,
}

fn parse_resource(value: &str) -> Result<ResourceType, String> {
    value.parse::<ResourceType>().map_err(|e| e.to_string())
}

fn log_event(event: &WatchNotification<'_>) -> anyhow::Result<()> {
    let name = event
        .object
        .map(|obj| statemirror::k8s::cache::ObjectKey::from_object(obj).to_string())
        .unwrap_or_default();
    info!("{} {} {}", event.kind, event.resource, name);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let args = Args::parse();

    let mut config = CacheConfig::default();
    if let Some(namespace) = args.namespace {
        config = config.with_namespace(namespace);
    }
    if args.immediate_retry {
        config = config.with_backoff(BackoffPolicy::immediate());
    }

    let kube = client::new(None).await?;
    let resource_client = Arc::new(KubeResourceClient::from_config(kube, &config));
    let cache = WatchCache::new(resource_client, config);

    for resource in &args.resources {
        cache.register_interest(resource, from_fn(log_event))?;
    }
    let handle = cache.start()?;

    match tokio::time::timeout(Duration::from_secs(args.ready_timeout_secs), cache.ready()).await {
        Ok(Ok(())) => {
            let stats = cache.stats();
            info!(
                "✅ Mirroring {} object(s) across {} type(s)",
                stats.total_objects(),
                stats.types.len()
            );
        }
        Ok(Err(e)) => {
            error!("❌ {}", e);
            handle.shutdown();
            return Err(e.into());
        }
        Err(_) => {
            error!("❌ Cache not ready after {}s", args.ready_timeout_secs);
            handle.shutdown();
            anyhow::bail!("cache not ready after {}s", args.ready_timeout_secs);
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown();
    Ok(())
}
