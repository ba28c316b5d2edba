//! Reconnect state machine over a [`StreamTransport`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;

use hearth_domain::event::Event;

use crate::backoff::BackoffPolicy;
use crate::error::ClientError;
use crate::transport::{EventStream, StreamTransport};
use crate::wire::{SseFrame, SseParser};

/// Capacity of the consumer-facing event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Where the client stands with respect to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// One-shot disposal signal shared between the handle and the worker task.
struct Disposal {
    flag: AtomicBool,
    notify: Notify,
}

impl Disposal {
    fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn dispose(&self) {
        self.flag.store(true, Ordering::Release);
        // The worker is the only waiter; the stored permit covers the case
        // where it has not reached its select yet.
        self.notify.notify_one();
    }

    fn is_disposed(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        while !self.is_disposed() {
            self.notify.notified().await;
        }
    }
}

/// Event-stream client that survives connection loss.
///
/// Failed connection attempts back off exponentially (see
/// [`BackoffPolicy`]); `max_attempts` retries are scheduled, and the next
/// consecutive failure is terminal — the worker resolves
/// [`ClientError::Exhausted`] and stays `Disconnected`. A successful
/// connection resets the attempt budget. Malformed events on an
/// established stream are dropped without touching the connection.
/// Disposal tears the worker down immediately, including any pending
/// backoff timer.
pub struct ReconnectingClient {
    transport: Arc<dyn StreamTransport>,
    policy: BackoffPolicy,
    state_tx: watch::Sender<ConnectionState>,
    disposal: Arc<Disposal>,
}

impl ReconnectingClient {
    #[must_use]
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            policy: BackoffPolicy::default(),
            state_tx,
            disposal: Arc::new(Disposal::new()),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch connection-state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Spawn the worker task. Events arrive on the returned channel. The
    /// handle resolves `Err(ClientError::Exhausted)` when the reconnect
    /// budget runs out, and `Ok(())` on disposal or when the receiver is
    /// dropped.
    #[must_use]
    pub fn start(&self) -> (mpsc::Receiver<Event>, JoinHandle<Result<(), ClientError>>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let worker = Worker {
            transport: Arc::clone(&self.transport),
            policy: self.policy.clone(),
            state_tx: self.state_tx.clone(),
            disposal: Arc::clone(&self.disposal),
            events,
        };
        (receiver, tokio::spawn(worker.run()))
    }

    /// Tear the worker down. Pending reconnect timers are cancelled; no
    /// further events are delivered.
    pub fn dispose(&self) {
        self.disposal.dispose();
    }
}

enum PumpEnd {
    /// The stream ended or broke; reconnect.
    StreamLost,
    /// The client was disposed or the consumer went away; shut down.
    Terminal,
}

struct Worker {
    transport: Arc<dyn StreamTransport>,
    policy: BackoffPolicy,
    state_tx: watch::Sender<ConnectionState>,
    disposal: Arc<Disposal>,
    events: mpsc::Sender<Event>,
}

impl Worker {
    async fn run(self) -> Result<(), ClientError> {
        let mut attempt: u32 = 0;
        let result = loop {
            if self.disposal.is_disposed() {
                break Ok(());
            }
            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                result = self.transport.connect() => result,
                () = self.disposal.wait() => break Ok(()),
            };
            match connected {
                Ok(stream) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    let end = self.pump(stream).await;
                    self.set_state(ConnectionState::Disconnected);
                    if matches!(end, PumpEnd::Terminal) {
                        break Ok(());
                    }
                    // A broken established stream reconnects immediately;
                    // only consecutive connect failures consume the retry
                    // budget.
                }
                Err(err) => {
                    attempt += 1;
                    self.set_state(ConnectionState::Disconnected);
                    // The budget covers scheduled retries: with five
                    // attempts allowed, the sixth consecutive failure is
                    // terminal.
                    if !self.policy.allows(attempt) {
                        tracing::error!(
                            %err,
                            attempts = attempt,
                            "giving up after repeated connection failures"
                        );
                        break Err(ClientError::exhausted(attempt));
                    }
                    let delay = self.policy.delay(attempt);
                    tracing::warn!(%err, attempt, ?delay, "connection failed, backing off");
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.disposal.wait() => break Ok(()),
                    }
                }
            }
        };
        self.set_state(ConnectionState::Disconnected);
        result
    }

    async fn pump(&self, mut stream: Box<dyn EventStream>) -> PumpEnd {
        let mut parser = SseParser::new();
        loop {
            let line = tokio::select! {
                line = stream.next_line() => line,
                () = self.disposal.wait() => return PumpEnd::Terminal,
            };
            match line {
                Ok(Some(line)) => {
                    if let Some(frame) = parser.push_line(&line) {
                        if !self.handle_frame(frame).await {
                            return PumpEnd::Terminal;
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("server closed the event stream");
                    return PumpEnd::StreamLost;
                }
                Err(err) => {
                    tracing::warn!(%err, "event stream broke");
                    return PumpEnd::StreamLost;
                }
            }
        }
    }

    // Returns false when the consumer is gone.
    async fn handle_frame(&self, frame: SseFrame) -> bool {
        match frame.event.as_deref() {
            Some("connected") => {
                tracing::debug!(session = %frame.data, "session established");
                true
            }
            Some("heartbeat") => true,
            _ => match serde_json::from_str::<Event>(&frame.data) {
                Ok(event) => self.events.send(event).await.is_ok(),
                Err(err) => {
                    // A bad payload is the server's bug, not a connection
                    // problem; drop it and keep the stream.
                    tracing::warn!(%err, "malformed event payload dropped");
                    true
                }
            },
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use async_trait::async_trait;
    use hearth_domain::id::DeviceId;

    use crate::error::ClientError;

    enum Script {
        Fail,
        Stream(Vec<String>),
        /// Stream that delivers its lines and then stays open forever.
        OpenStream(Vec<String>),
    }

    struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        connects: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                connects: AtomicU32::new(0),
            }
        }

        fn connects(&self) -> u32 {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamTransport for ScriptedTransport {
        async fn connect(&self) -> Result<Box<dyn EventStream>, ClientError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.scripts.lock().unwrap().pop_front() {
                Some(Script::Stream(lines)) => Ok(Box::new(ScriptedStream {
                    lines: lines.into(),
                    hold_open: false,
                })),
                Some(Script::OpenStream(lines)) => Ok(Box::new(ScriptedStream {
                    lines: lines.into(),
                    hold_open: true,
                })),
                Some(Script::Fail) | None => Err(ClientError::connect("connection refused")),
            }
        }
    }

    struct ScriptedStream {
        lines: VecDeque<String>,
        hold_open: bool,
    }

    #[async_trait]
    impl EventStream for ScriptedStream {
        async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
            match self.lines.pop_front() {
                Some(line) => Ok(Some(line)),
                None if self.hold_open => std::future::pending().await,
                None => Ok(None),
            }
        }
    }

    fn framed(event: &Event) -> Vec<String> {
        vec![
            format!("event: {}", event.event_type),
            format!("data: {}", serde_json::to_string(event).unwrap()),
            String::new(),
        ]
    }

    fn preamble() -> Vec<String> {
        vec![
            "event: connected".to_string(),
            "data: {\"session_id\":\"s1\"}".to_string(),
            String::new(),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn should_deliver_parsed_events_after_connecting() {
        let event = Event::device_state(DeviceId::new("d1"), serde_json::json!({"on": true}));
        let mut lines = preamble();
        lines.extend(framed(&event));
        let transport = Arc::new(ScriptedTransport::new(vec![Script::OpenStream(lines)]));
        let client = ReconnectingClient::new(transport);

        let (mut events, handle) = client.start();
        let received = events.recv().await.unwrap();
        assert_eq!(received.routing_key.as_str(), "device.d1.state");

        client.dispose();
        assert_eq!(handle.await.unwrap(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_up_after_exhausting_the_retry_schedule() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let client = ReconnectingClient::new(transport.clone());

        let (_events, handle) = client.start();
        let result = handle.await.unwrap();

        // Five scheduled retries (1s, 2s, 4s, 8s, 16s), then the sixth
        // consecutive failure is terminal.
        assert_eq!(transport.connects(), 6);
        assert_eq!(result, Err(ClientError::Exhausted { attempts: 6 }));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn should_reset_attempt_budget_after_successful_connection() {
        let event = Event::device_available(DeviceId::new("d1"), true);
        let transport = Arc::new(ScriptedTransport::new(vec![
            Script::Fail,
            Script::Fail,
            Script::Stream(framed(&event)),
        ]));
        let client = ReconnectingClient::new(transport.clone());

        let (mut events, handle) = client.start();
        assert!(events.recv().await.is_some());
        let result = handle.await.unwrap();

        // Two failures, one success, then a fresh budget: five scheduled
        // retries plus the terminal sixth failure.
        assert_eq!(transport.connects(), 9);
        assert!(matches!(result, Err(ClientError::Exhausted { attempts: 6 })));
    }

    #[tokio::test(start_paused = true)]
    async fn should_drop_malformed_payload_without_losing_the_stream() {
        let good = Event::device_available(DeviceId::new("d1"), true);
        let mut lines = vec![
            "event: state".to_string(),
            "data: not json at all".to_string(),
            String::new(),
        ];
        lines.extend(framed(&good));
        let transport = Arc::new(ScriptedTransport::new(vec![Script::OpenStream(lines)]));
        let client = ReconnectingClient::new(transport);

        let (mut events, handle) = client.start();
        let received = events.recv().await.unwrap();
        assert_eq!(received.routing_key.as_str(), "device.d1.available");

        client.dispose();
        assert_eq!(handle.await.unwrap(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_heartbeat_frames() {
        let good = Event::device_available(DeviceId::new("d1"), true);
        let mut lines = vec![
            "event: heartbeat".to_string(),
            "data: {}".to_string(),
            String::new(),
        ];
        lines.extend(framed(&good));
        let transport = Arc::new(ScriptedTransport::new(vec![Script::OpenStream(lines)]));
        let client = ReconnectingClient::new(transport);

        let (mut events, handle) = client.start();
        let received = events.recv().await.unwrap();
        assert_eq!(received.event_type, hearth_domain::event::EventType::Available);

        client.dispose();
        assert_eq!(handle.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn should_cancel_pending_backoff_on_dispose() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let client = ReconnectingClient::new(transport).with_policy(BackoffPolicy {
            base: Duration::from_secs(3600),
            cap: Duration::from_secs(3600),
            max_attempts: 5,
        });

        let (_events, handle) = client.start();
        // Let the first attempt fail and the hour-long backoff begin.
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.dispose();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not shut down promptly")
            .unwrap();
        assert_eq!(result, Ok(()));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_connected_state_while_streaming() {
        let transport = Arc::new(ScriptedTransport::new(vec![Script::OpenStream(preamble())]));
        let client = ReconnectingClient::new(transport);
        let mut states = client.state_changes();

        let (_events, handle) = client.start();
        loop {
            states.changed().await.unwrap();
            if *states.borrow() == ConnectionState::Connected {
                break;
            }
        }

        client.dispose();
        assert_eq!(handle.await.unwrap(), Ok(()));
    }
}
