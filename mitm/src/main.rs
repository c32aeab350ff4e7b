//! The MITM proxy binary (§4.L): loads `ProxyConfig`, installs logging,
//! builds the process-global forged key pair and packet registry once, then
//! runs the packet-level MITM and the HTTP join-patcher as two concurrent
//! listening tasks until cancelled.

mod config;

use std::path::Path;
use std::sync::Arc;

use config::LoadOutcome;
use mitm_core::ReplacementSlot;
use mitm_crypto::KeyStore;
use mitm_net::interceptor;
use mitm_protocol::{ProtocolVersion, Registry};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const CONFIG_PATH: &str = "config/mitm_config.json5";

fn install_logging() {
    tracing_log::LogTracer::init().expect("failed to install the log-to-tracing bridge");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "mitm starting");

    let cfg = match config::load_or_create(Path::new(CONFIG_PATH)) {
        Ok(LoadOutcome::Loaded(cfg)) => {
            info!(
                packet_listen_addr = %cfg.packet_listen_addr,
                http_listen_addr = %cfg.http_listen_addr,
                "config loaded"
            );
            cfg
        }
        Ok(LoadOutcome::Created) => {
            info!(path = CONFIG_PATH, "wrote a default config; review it and start mitm again");
            eprintln!("Wrote a default config to {CONFIG_PATH}. Review the inbound/outbound settings, then run mitm again.");
            return Ok(());
        }
        Err(error) => {
            eprintln!("FATAL: failed to load config: {error}");
            std::process::exit(1);
        }
    };

    let protocol = ProtocolVersion(cfg.protocol_version);
    let registry = Arc::new(Registry::build(protocol).map_err(|error| {
        error!(%error, "failed to build packet registry");
        error
    })?);
    let key_store = Arc::new(KeyStore::create().map_err(|error| {
        error!(%error, "failed to generate the forged RSA keypair");
        error
    })?);
    let replacement_slot = Arc::new(ReplacementSlot::new());
    let cancel = CancellationToken::new();

    let packet_intercept = {
        let registry = Arc::clone(&registry);
        let key_store = Arc::clone(&key_store);
        let replacement_slot = Arc::clone(&replacement_slot);
        interceptor::intercept_fn(move |client, server| {
            let registry = Arc::clone(&registry);
            let key_store = Arc::clone(&key_store);
            let replacement_slot = Arc::clone(&replacement_slot);
            async move {
                mitm_core::packet_mitm::run(client, server, protocol, registry, move |mitm| {
                    mitm_core::pk_mitm::install_pk_mitm_listeners(mitm, key_store, replacement_slot);
                })
                .await
                .map_err(mitm_core::CoreError::into_net_error)
            }
        })
    };

    let http_intercept = {
        let replacement_slot = Arc::clone(&replacement_slot);
        interceptor::intercept_fn(move |client, server| {
            let replacement_slot = Arc::clone(&replacement_slot);
            async move { mitm_core::http_patch::run(client, server, replacement_slot).await.map_err(mitm_core::CoreError::into_net_error) }
        })
    };

    let packet_cancel = cancel.clone();
    let packet_task = tokio::spawn(interceptor::run(
        cfg.packet_listen_addr,
        cfg.inbound_method(),
        cfg.outbound_method(),
        packet_intercept,
        packet_cancel,
    ));

    let http_cancel = cancel.clone();
    let http_task = tokio::spawn(interceptor::run(
        cfg.http_listen_addr,
        cfg.inbound_method(),
        cfg.outbound_method(),
        http_intercept,
        http_cancel,
    ));

    tokio::select! {
        result = packet_task => {
            if let Err(error) = result? {
                error!(%error, "packet interceptor exited");
            }
        }
        result = http_task => {
            if let Err(error) = result? {
                error!(%error, "http join-patcher interceptor exited");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            cancel.cancel();
        }
    }

    Ok(())
}
