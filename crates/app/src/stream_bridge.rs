//! Stream bridge — fans bus events out to streaming sessions.
//!
//! The bridge holds one catch-all bus subscription and replicates each
//! event into every session whose filter accepts it. Session queues are
//! bounded and drop their *oldest* entry when full: a stalled client sees
//! the most recent events when it resumes, and never slows the bus down.
//! Heartbeats go to every session unfiltered so clients can detect a dead
//! connection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use hearth_domain::event::{Event, EventType};
use hearth_domain::id::{DeviceId, SessionId};
use hearth_domain::routing::Pattern;

use crate::event_bus::EventBus;

/// Per-session queue capacity; the oldest event is dropped on overflow.
pub const SESSION_QUEUE_CAPACITY: usize = 100;

/// Interval between liveness heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// What a session wants to see. Empty filter means everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Only events concerning this device.
    pub device_id: Option<DeviceId>,
    /// Only events of this type.
    pub event_type: Option<EventType>,
}

impl SessionFilter {
    fn accepts(&self, event: &Event) -> bool {
        if let Some(device_id) = &self.device_id {
            if event.device_id.as_ref() != Some(device_id) {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        true
    }
}

// Single-consumer drop-oldest queue. `close` hands the consumer a permit so
// a concurrent `pop` cannot miss the shutdown.
struct SessionQueue {
    events: std::sync::Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
}

impl SessionQueue {
    fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(VecDeque::with_capacity(SESSION_QUEUE_CAPACITY)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn push(&self, event: Event) {
        let mut events = self.events.lock().expect("session queue poisoned");
        if events.len() == SESSION_QUEUE_CAPACITY {
            events.pop_front();
        }
        events.push_back(event);
        drop(events);
        self.notify.notify_one();
    }

    async fn pop(&self) -> Option<Event> {
        loop {
            if let Some(event) = self
                .events
                .lock()
                .expect("session queue poisoned")
                .pop_front()
            {
                return Some(event);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Receiving end of one streaming session.
///
/// `recv` resolves to `None` once the session is closed and its queue is
/// drained.
pub struct SessionHandle {
    id: SessionId,
    queue: Arc<SessionQueue>,
}

impl SessionHandle {
    /// The session's id, needed to close it.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Next event for this session.
    pub async fn recv(&mut self) -> Option<Event> {
        self.queue.pop().await
    }
}

struct SessionEntry {
    filter: SessionFilter,
    queue: Arc<SessionQueue>,
}

/// Fan-out point between the event bus and streaming clients.
#[derive(Default)]
pub struct StreamBridge {
    sessions: DashMap<SessionId, SessionEntry>,
}

impl StreamBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a streaming session with the given filter.
    #[must_use]
    pub fn open_session(&self, filter: SessionFilter) -> SessionHandle {
        let id = SessionId::new();
        let queue = Arc::new(SessionQueue::new());
        self.sessions.insert(
            id,
            SessionEntry {
                filter,
                queue: Arc::clone(&queue),
            },
        );
        tracing::debug!(session = %id, "streaming session opened");
        SessionHandle { id, queue }
    }

    /// Close a session. Its handle's `recv` drains what is queued, then
    /// returns `None`. Unknown ids are ignored.
    pub fn close_session(&self, id: SessionId) {
        if let Some((_, entry)) = self.sessions.remove(&id) {
            entry.queue.close();
            tracing::debug!(session = %id, "streaming session closed");
        }
    }

    /// Number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Replicate one bus event into every accepting session.
    ///
    /// `command` events are requests addressed to plugins, not
    /// observations; they are never forwarded.
    pub fn deliver(&self, event: &Event) {
        if event.event_type == EventType::Command {
            return;
        }
        for entry in &self.sessions {
            if entry.filter.accepts(event) {
                entry.queue.push(event.clone());
            }
        }
    }

    /// Spawn the bus consumer feeding [`Self::deliver`].
    #[must_use]
    pub fn run(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let (_, mut receiver) = bus.subscribe(Pattern::catch_all());
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                self.deliver(&event);
            }
        })
    }

    /// Spawn the heartbeat task. Heartbeats bypass session filters.
    #[must_use]
    pub fn run_heartbeats(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so clients get their
            // `connected` preamble before any heartbeat.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for entry in &self.sessions {
                    entry.queue.push(Event::heartbeat());
                }
            }
        })
    }
}
