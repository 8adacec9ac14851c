//! Event system for the HFP engine
//!
//! Protocol activity is published on a multi-producer, multi-consumer bus.
//! Every subscriber gets an independent view of the stream from its
//! subscription point onward, in global emission order. Emission never
//! blocks: a subscriber that falls behind loses its oldest undelivered
//! events, and the loss is counted on that subscriber alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Default bound on undelivered events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events emitted by the HFP engine
///
/// Call, audio and indicator variants are projections of gateway activity;
/// `CallerSpeech` is injected by an attached voice pipeline and `Error`
/// carries asynchronous failures that have no waiting caller.
#[derive(Debug, Clone, PartialEq)]
pub enum HfpEvent {
    /// Service-level connection established
    Connected,
    /// Service-level connection lost
    Disconnected(Option<String>),
    /// Service-level connection setup failed
    ConnectFailed(Option<String>),
    /// Incoming call, with the caller's number when known
    IncomingCall(Option<String>),
    /// An incoming call was answered
    CallAnswered,
    /// The call ended
    CallEnded,
    /// Outgoing call, number sent to the network
    CallDialing(String),
    /// Outgoing call, remote party alerting
    CallAlerting,
    /// Call is up
    CallActive,
    /// Call placed on hold
    CallHeld,
    /// Third-party call waiting
    CallWaiting(Option<String>),
    /// SCO audio link opened
    ScoConnected,
    /// SCO audio link closed
    ScoDisconnected,
    /// Signal strength indicator, 0..=5
    SignalStrength(u8),
    /// Battery charge indicator, 0..=5
    BatteryLevel(u8),
    /// Cellular service availability
    ServiceAvailable(bool),
    /// Roaming indicator
    Roaming(bool),
    /// Raw callsetup indicator, 0..=3
    CallSetup(u8),
    /// Raw call indicator
    CallIndicator(bool),
    /// Raw callheld indicator, 0..=2
    CallHeldIndicator(u8),
    /// Caller identification
    CallerId {
        /// Caller's number
        number: String,
        /// Caller's name, when the gateway reports one
        name: Option<String>,
    },
    /// Registered operator name
    OperatorName(String),
    /// Transcribed speech from the remote party, injected by a voice pipeline
    CallerSpeech(String),
    /// Asynchronous engine failure
    Error(String),
}

/// Multi-consumer broadcaster for [`HfpEvent`]s
///
/// Cloning the bus yields another handle onto the same channel; the
/// underlying broadcast sender is the single serialization point for
/// concurrent emitters.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HfpEvent>,
    emitted: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus with the default per-subscriber capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a bus bounding each subscriber to `capacity` undelivered events
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Deliver an event to every current subscriber
    ///
    /// Never blocks. An emit with no subscribers is not an error; the event
    /// is simply discarded.
    pub fn emit(&self, event: HfpEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    /// Open an independent subscription starting at the current point
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            inner: self.sender.subscribe(),
            dropped: 0,
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events emitted over the lifetime of the bus
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's lazy view of the event stream
///
/// Dropping the subscription unsubscribes; events already queued for it are
/// discarded.
#[derive(Debug)]
pub struct EventSubscription {
    inner: broadcast::Receiver<HfpEvent>,
    dropped: u64,
}

impl EventSubscription {
    /// Receive the next event, or `None` once the bus is gone
    ///
    /// If this subscriber fell behind and lost events, the loss is added to
    /// [`dropped`](Self::dropped) and delivery continues with the oldest
    /// retained event.
    pub async fn recv(&mut self) -> Option<HfpEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped += n;
                    warn!(missed = n, "subscriber lagged, dropping oldest events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Events dropped for this subscriber because its buffer overflowed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Convert into a `Stream` of events
    ///
    /// The stream yields `Err(BroadcastStreamRecvError::Lagged)` items in
    /// place of this wrapper's drop accounting.
    pub fn into_stream(self) -> BroadcastStream<HfpEvent> {
        BroadcastStream::new(self.inner)
    }
}
