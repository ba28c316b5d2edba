//! Server-sent event stream for real-time updates.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, Sse};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use hearth_app::stream_bridge::SessionFilter;
use hearth_domain::event::EventType;
use hearth_domain::id::DeviceId;

use crate::state::AppState;

/// Query parameters for the stream endpoint.
#[derive(Deserialize)]
pub struct StreamQuery {
    pub device_id: Option<String>,
    pub event_type: Option<EventType>,
}

/// `GET /api/events/stream` — SSE stream of hub events.
///
/// Opens a streaming session on the bridge, filtered by the query
/// parameters. The first frame is always a `connected` event carrying the
/// session id; afterwards each bus event accepted by the filter is sent as
/// one SSE frame whose `event` field is the event type. Heartbeats arrive
/// every 30 seconds. Dropping the connection closes the session.
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let filter = SessionFilter {
        device_id: query.device_id.map(DeviceId::from),
        event_type: query.event_type,
    };
    open(state, filter)
}

/// `GET /api/events/devices/{id}/stream` — SSE stream for one device.
///
/// Convenience form of [`stream`] with the device filter fixed from the
/// path.
pub async fn device_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let filter = SessionFilter {
        device_id: Some(DeviceId::from(id)),
        event_type: None,
    };
    open(state, filter)
}

fn open(
    state: AppState,
    filter: SessionFilter,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let mut session = state.bridge.open_session(filter);
    let session_id = session.id();

    let connected = SseEvent::default()
        .event("connected")
        .data(serde_json::json!({ "session_id": session_id }).to_string());

    // Pump session events into the response channel. When the client goes
    // away the receiver is dropped, the send fails, and the session is
    // closed so the bridge stops replicating into it.
    let (sender, receiver) = mpsc::channel::<SseEvent>(16);
    let bridge = Arc::clone(&state.bridge);
    tokio::spawn(async move {
        while let Some(event) = session.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => SseEvent::default().event(event.event_type.as_str()).data(json),
                Err(err) => {
                    tracing::warn!(%err, "failed to serialize event for SSE stream");
                    continue;
                }
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
        bridge.close_session(session_id);
    });

    let stream =
        tokio_stream::once(Ok(connected)).chain(ReceiverStream::new(receiver).map(Ok));
    Sse::new(stream)
}
