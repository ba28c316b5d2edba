//! # hearthd — hearth daemon
//!
//! Composition root that wires everything together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Construct the event bus, state store, stream bridge, and supervisor
//! - Register and start the configured plugins
//! - Build the axum router, bind to a TCP port, and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT): stop plugins, announce
//!   `system.stop`
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod factory;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use hearth_adapter_http_axum::router;
use hearth_adapter_http_axum::state::AppState;
use hearth_app::event_bus::EventBus;
use hearth_app::ports::EventPublisher;
use hearth_app::state_store::DeviceStateStore;
use hearth_app::stream_bridge::StreamBridge;
use hearth_app::supervisor::PluginSupervisor;

use config::Config;
use factory::HubPluginFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Core components
    let bus = Arc::new(EventBus::new(config.bus.capacity));
    let store = Arc::new(DeviceStateStore::new());
    let bridge = Arc::new(StreamBridge::new());
    let factory = Arc::new(HubPluginFactory::new(bus.clone()));
    let supervisor = Arc::new(
        PluginSupervisor::new(Arc::clone(&bus), Arc::clone(&store), factory)
            .with_stop_timeout(std::time::Duration::from_secs(
                config.lifecycle.stop_timeout_secs,
            )),
    );

    // Background consumers
    let store_task = Arc::clone(&store).run(&bus);
    let bridge_task = Arc::clone(&bridge).run(&bus);
    let heartbeat_task = Arc::clone(&bridge).run_heartbeats();
    let command_task = Arc::clone(&supervisor).run(&bus);

    // Plugins: a bad descriptor is logged, never fatal.
    for descriptor in config.plugins.clone() {
        let id = descriptor.id.clone();
        if let Err(err) = supervisor.register(descriptor).await {
            tracing::error!(plugin = %id, %err, "failed to register plugin");
        }
    }
    supervisor.start_all().await;
    bus.publish_system("start", serde_json::json!({})).await?;

    // HTTP
    let state = AppState::new(Arc::clone(&supervisor), store, bridge);
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "hearthd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    supervisor.stop_all().await;
    if let Err(err) = bus.publish_system("stop", serde_json::json!({})).await {
        tracing::warn!(%err, "failed to announce shutdown");
    }
    for task in [store_task, bridge_task, heartbeat_task, command_task] {
        task.abort();
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(%err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
