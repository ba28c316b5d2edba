//! End-to-end smoke tests for the full hearthd stack.
//!
//! Each test spins up the complete application (real bus, store, bridge,
//! supervisor, virtual plugin, real axum router) and exercises the HTTP
//! layer via `tower::ServiceExt::oneshot` — no TCP port is bound.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use hearth_adapter_http_axum::router;
use hearth_adapter_http_axum::state::AppState;
use hearth_app::event_bus::EventBus;
use hearth_app::ports::{EventPublisher, Plugin, PluginFactory};
use hearth_app::state_store::DeviceStateStore;
use hearth_app::stream_bridge::StreamBridge;
use hearth_app::supervisor::PluginSupervisor;
use hearth_adapter_virtual::VirtualPlugin;
use hearth_domain::error::{HubError, NotFoundError};
use hearth_domain::id::DeviceId;
use hearth_domain::plugin::{PluginDescriptor, PluginKind};

struct VirtualOnlyFactory {
    publisher: Arc<dyn EventPublisher>,
}

#[async_trait::async_trait]
impl PluginFactory for VirtualOnlyFactory {
    async fn build(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn Plugin>, HubError> {
        if descriptor.module == "virtual" {
            Ok(Box::new(VirtualPlugin::new(
                descriptor.id.clone(),
                descriptor.config.clone(),
                Arc::clone(&self.publisher),
            )))
        } else {
            Err(NotFoundError {
                entity: "Plugin module",
                id: descriptor.module.clone(),
            }
            .into())
        }
    }
}

struct Harness {
    app: axum::Router,
    store: Arc<DeviceStateStore>,
    supervisor: Arc<PluginSupervisor>,
    bus: Arc<EventBus>,
}

/// Build a fully-wired router with one running virtual plugin.
async fn harness() -> Harness {
    let bus = Arc::new(EventBus::default());
    let store = Arc::new(DeviceStateStore::new());
    let bridge = Arc::new(StreamBridge::new());
    let factory = Arc::new(VirtualOnlyFactory {
        publisher: bus.clone(),
    });
    let supervisor = Arc::new(PluginSupervisor::new(
        Arc::clone(&bus),
        Arc::clone(&store),
        factory,
    ));

    let _ = Arc::clone(&store).run(&bus);
    let _ = Arc::clone(&bridge).run(&bus);
    let _ = Arc::clone(&supervisor).run(&bus);

    supervisor
        .register(PluginDescriptor::new(
            "virtual",
            PluginKind::Device,
            "virtual",
        ))
        .await
        .unwrap();
    supervisor.start_all().await;

    let state = AppState::new(Arc::clone(&supervisor), Arc::clone(&store), bridge);
    Harness {
        app: router::build(state),
        store,
        supervisor,
        bus,
    }
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn should_list_discovered_virtual_devices() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/devices")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let devices = body_json(resp.into_body()).await;
    assert_eq!(devices.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn should_filter_device_list_by_type() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/devices?type=light")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let devices = body_json(resp.into_body()).await;
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["info"]["id"], "virtual_light");
}

#[tokio::test]
async fn should_execute_command_and_converge_stored_state() {
    let harness = harness().await;

    let resp = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/devices/virtual_light/command")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"command":"turn_on"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let result = body_json(resp.into_body()).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["state"]["on"], true);

    // The published state event reaches the store through the bus consumer.
    let device_id = DeviceId::new("virtual_light");
    let mut converged = false;
    for _ in 0..100 {
        if harness.store.snapshot(&device_id).unwrap().state.on == Some(true) {
            converged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(converged, "state store never saw the published state event");
}

#[tokio::test]
async fn should_return_bare_state_from_state_endpoint() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/devices/virtual_light/state")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let state = body_json(resp.into_body()).await;
    // Bare state object, no info envelope.
    assert!(state.get("info").is_none());
    assert!(state.get("online").is_some());
}

#[tokio::test]
async fn should_restart_plugin_via_reload_route() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/plugins/virtual/reload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let statuses = harness.supervisor.plugin_statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state.as_str(), "running");
}

#[tokio::test]
async fn should_return_404_for_unknown_device_command() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/devices/ghost/command")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"command":"turn_on"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn should_return_502_when_device_rejects_command() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/devices/virtual_sensor/command")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"command":"turn_on"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn should_report_running_plugin_with_devices() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/plugins")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let plugins = body_json(resp.into_body()).await;
    let plugins = plugins.as_array().unwrap();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0]["state"], "running");
    assert_eq!(plugins[0]["device_count"], 3);
}

#[tokio::test]
async fn should_return_503_for_command_after_plugin_stopped() {
    let harness = harness().await;
    harness
        .supervisor
        .stop_plugin(&"virtual".into())
        .await
        .unwrap();

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/devices/virtual_light/command")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"command":"turn_on"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn should_send_connected_preamble_on_event_stream() {
    let harness = harness().await;

    let resp = harness
        .app
        .oneshot(
            Request::builder()
                .uri("/api/events/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let mut body = resp.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: connected"));
    assert!(text.contains("session_id"));
}

#[tokio::test]
async fn should_stream_state_events_to_sse_client() {
    let harness = harness().await;

    let resp = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/events/stream?device_id=virtual_light&event_type=state")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let mut body = resp.into_body();

    // Consume the connected preamble first.
    let _ = body.frame().await.unwrap().unwrap();

    harness
        .bus
        .publish_device_state(
            DeviceId::new("virtual_light"),
            serde_json::json!({"online": true, "on": true}),
        )
        .await
        .unwrap();

    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: state"));
    assert!(text.contains("device.virtual_light.state"));
}

#[tokio::test]
async fn should_scope_device_stream_to_path_device() {
    let harness = harness().await;

    let resp = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/events/devices/virtual_light/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let mut body = resp.into_body();

    // Consume the connected preamble first.
    let _ = body.frame().await.unwrap().unwrap();

    // An event for a different device must not appear on this stream.
    harness
        .bus
        .publish_device_state(DeviceId::new("virtual_switch"), serde_json::json!({"on": true}))
        .await
        .unwrap();
    harness
        .bus
        .publish_device_state(DeviceId::new("virtual_light"), serde_json::json!({"on": true}))
        .await
        .unwrap();

    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("device.virtual_light.state"));
    assert!(!text.contains("virtual_switch"));
}
