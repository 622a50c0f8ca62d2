//! Demo wiring of artemis-failover-k8s against a live cluster.
//!
//! Watches the acceptor routes of an ActiveMQ Artemis cluster and logs the
//! aggregated failover URL every time the damper refreshes the producer. A
//! real deployment would replace [`LoggingProducer`] with an implementation
//! wrapping an actual AMQP connection.
//!
//! # Running in OpenShift
//!
//! The demo expects cluster access (in-cluster config or kubeconfig) with
//! RBAC permissions to watch `Route` resources.
//!
//! # Environment Variables
//!
//! - `CLUSTER_NAME`: Artemis cluster name (default: my-broker)
//! - `ACCEPTOR_NAME`: acceptor whose routes to follow (default: amqps)
//! - `NAMESPACE`: namespace of the cluster (default: uses client namespace)
//! - `BROKER_PORT`: external acceptor port (default: 443)
//! - `BROKER_USERNAME` / `BROKER_PASSWORD`: credentials (default: admin/admin)
//! - `CLIENT_ID`: client id presented to the broker (default: console-producer)
//! - `TRUST_STORE` / `TRUST_STORE_PASSWORD`: TLS trust material
//!   (default: ./client.ts / password)

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use artemis_failover_k8s::{
    ConnectionParams, Damper, EndpointSet, Producer, ProducerError, RouteFilter, RouteTracker,
    WatchConfig, failover_url, watch_routes,
};
use async_trait::async_trait;
use tracing::{Level, info};

/// Producer stand-in that logs every connection rebuild.
struct LoggingProducer;

#[async_trait]
impl Producer for LoggingProducer {
    async fn start(&self, broker_urls: &HashSet<String>) -> Result<(), ProducerError> {
        info!("connecting producer: {}", failover_url(broker_urls));
        Ok(())
    }

    async fn stop(&self) -> Result<(), ProducerError> {
        info!("disconnecting producer");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    // Read configuration from environment
    let cluster_name = env::var("CLUSTER_NAME").unwrap_or_else(|_| "my-broker".to_string());
    let acceptor_name = env::var("ACCEPTOR_NAME").unwrap_or_else(|_| "amqps".to_string());
    let namespace = env::var("NAMESPACE").ok();
    let port: u16 = env::var("BROKER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(443);

    let params = ConnectionParams {
        protocol: "amqps".to_string(),
        port,
        client_id: env::var("CLIENT_ID").unwrap_or_else(|_| "console-producer".to_string()),
        username: env::var("BROKER_USERNAME").unwrap_or_else(|_| "admin".to_string()),
        password: env::var("BROKER_PASSWORD").unwrap_or_else(|_| "admin".to_string()),
        trust_store: PathBuf::from(
            env::var("TRUST_STORE").unwrap_or_else(|_| "./client.ts".to_string()),
        ),
        trust_store_password: env::var("TRUST_STORE_PASSWORD")
            .unwrap_or_else(|_| "password".to_string()),
    };

    info!("Starting console producer");
    info!("Cluster: {cluster_name}");
    info!("Acceptor: {acceptor_name}");
    if let Some(ref ns) = namespace {
        info!("Namespace: {ns}");
    }

    // The damper owns the producer; the tracker writes the endpoint set and
    // signals the damper on every real change.
    let endpoints = EndpointSet::new();
    let damper = Damper::spawn(LoggingProducer, endpoints.clone());
    let tracker = RouteTracker::new(
        params,
        RouteFilter::for_acceptor(&cluster_name, &acceptor_name)?,
        endpoints,
        damper.signal(),
    );

    let mut config = WatchConfig::new(&cluster_name);
    if let Some(ns) = namespace {
        config = config.namespace(ns);
    }

    watch_routes(config, tracker);

    info!("Watching acceptor routes; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    damper.close().await;

    Ok(())
}
