//! The HFP protocol engine
//!
//! One [`HfpEngine`] owns one gateway session: the transport handle, the
//! event bus and the state projection. Control requests are validated here
//! and issued through the transport; everything the gateway does comes back
//! as transport callbacks, is translated into [`HfpEvent`]s, and flows
//! through the bus to the state tracker and any external subscribers.
//!
//! Two background tasks run per engine: the translate task, which turns
//! transport callbacks into bus events, and the drain task, the single
//! writer feeding the state tracker in delivery order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::at;
use crate::call::CallStatus;
use crate::error::{HfpError, HfpResult};
use crate::events::{EventBus, EventSubscription, HfpEvent, DEFAULT_EVENT_CAPACITY};
use crate::state::{ConnectionStatus, HfpState, StateTracker};
use crate::transport::{BluetoothTransport, TransportEvent};

/// Default bound on SLC establishment
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Tunables for an engine instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on SLC establishment in [`HfpEngine::connect`]
    pub connect_timeout: Duration,
    /// Per-subscriber event buffer capacity
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Protocol engine for one HFP session
///
/// Created over a transport, then [`start`](Self::start)ed to wire up the
/// background tasks. All operations require a started engine; operations
/// that talk to the gateway additionally require an established SLC.
pub struct HfpEngine {
    transport: Arc<dyn BluetoothTransport>,
    bus: EventBus,
    state: Arc<StateTracker>,
    session_id: Uuid,
    config: EngineConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl HfpEngine {
    /// Create an engine with default configuration
    pub fn new(transport: Arc<dyn BluetoothTransport>) -> Arc<Self> {
        Self::with_config(transport, EngineConfig::default())
    }

    /// Create an engine with explicit configuration
    pub fn with_config(transport: Arc<dyn BluetoothTransport>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            transport,
            bus: EventBus::with_capacity(config.event_capacity),
            state: Arc::new(StateTracker::new()),
            session_id: Uuid::new_v4(),
            config,
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }

    /// Wire up the translate and drain tasks and register with the transport
    ///
    /// Idempotent; the drain subscription is opened before the transport can
    /// produce its first callback, so no event is lost.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let drain_sub = self.bus.subscribe();
        let state = self.state.clone();
        let drain = tokio::spawn(async move {
            drain_loop(drain_sub, state).await;
        });

        let (tx, rx) = mpsc::unbounded_channel();
        self.transport.set_event_sender(tx);
        let bus = self.bus.clone();
        let translate = tokio::spawn(async move {
            translate_loop(rx, bus).await;
        });

        self.tasks.lock().unwrap().extend([drain, translate]);
        info!(session = %self.session_id, "HFP engine started");
    }

    /// Cancel the background tasks and close the transport, best-effort
    ///
    /// Events not yet delivered to subscribers are dropped.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let tasks: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        if let Err(e) = self.transport.disconnect().await {
            debug!(session = %self.session_id, error = %e, "transport close on shutdown failed");
        }
        info!(session = %self.session_id, "HFP engine stopped");
    }

    /// Open an independent subscription to the engine's events
    pub fn subscribe(&self) -> EventSubscription {
        self.bus.subscribe()
    }

    /// Snapshot of the current connection, call, audio and phone state
    pub async fn state(&self) -> HfpState {
        self.state.snapshot().await
    }

    /// Emit an externally produced event onto the bus
    ///
    /// This is the entry offered to a voice pipeline for `CallerSpeech`, and
    /// to anything else that needs to share the engine's event stream.
    pub fn inject_event(&self, event: HfpEvent) {
        self.bus.emit(event);
    }

    /// Establish the service-level connection, bounded by the configured
    /// timeout
    pub async fn connect(&self) -> HfpResult<()> {
        self.connect_with_timeout(self.config.connect_timeout).await
    }

    /// Establish the service-level connection, bounded by `timeout`
    ///
    /// Resolves on the first of: SLC established, setup rejected, link lost,
    /// timer elapsed. On any failure the engine's connection state is
    /// `Disconnected` when this returns; on success `Connected` is visible
    /// before this returns.
    pub async fn connect_with_timeout(&self, timeout: Duration) -> HfpResult<()> {
        if self.state.snapshot().await.connection == ConnectionStatus::Connected {
            return Ok(());
        }

        // subscribe before initiating so the outcome event cannot be missed
        let mut sub = self.bus.subscribe();
        self.state.mark_connecting().await;
        info!(session = %self.session_id, "connecting to gateway");

        if let Err(e) = self.transport.connect().await {
            let reason = e.to_string();
            self.bus.emit(HfpEvent::ConnectFailed(Some(reason.clone())));
            self.state
                .apply(&HfpEvent::ConnectFailed(Some(reason.clone())))
                .await;
            return Err(HfpError::connection_failed(reason));
        }

        let outcome = tokio::time::timeout(timeout, async {
            while let Some(event) = sub.recv().await {
                match event {
                    HfpEvent::Connected => return Ok(()),
                    HfpEvent::ConnectFailed(reason) | HfpEvent::Disconnected(reason) => {
                        return Err(reason)
                    }
                    _ => {}
                }
            }
            Err(Some("event stream closed".to_string()))
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                // make the transition visible to the caller now; the drain
                // task applies the same event idempotently
                self.state.apply(&HfpEvent::Connected).await;
                info!(session = %self.session_id, "service-level connection established");
                Ok(())
            }
            Ok(Err(reason)) => {
                let reason = reason.unwrap_or_else(|| "connection rejected".to_string());
                self.state
                    .apply(&HfpEvent::ConnectFailed(Some(reason.clone())))
                    .await;
                warn!(session = %self.session_id, %reason, "connection failed");
                Err(HfpError::connection_failed(reason))
            }
            Err(_) => {
                let reason = "connection timed out".to_string();
                self.bus.emit(HfpEvent::ConnectFailed(Some(reason.clone())));
                self.state
                    .apply(&HfpEvent::ConnectFailed(Some(reason.clone())))
                    .await;
                let _ = self.transport.disconnect().await;
                warn!(session = %self.session_id, "connection timed out");
                Err(HfpError::connection_failed(reason))
            }
        }
    }

    /// Ask the transport to close the SLC, best-effort
    ///
    /// State is reset when the `Disconnected` event arrives, not here.
    pub async fn disconnect(&self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!(session = %self.session_id, error = %e, "disconnect request failed");
        }
    }

    /// Place an outgoing call
    ///
    /// The `CallDialing` event is emitted before the transport is asked to
    /// dial, so bus observers see the transition even if the driver is slow.
    pub async fn dial(&self, number: impl Into<String>) -> HfpResult<()> {
        self.require_connected().await?;
        let number = number.into();
        info!(session = %self.session_id, %number, "dialing");
        self.bus.emit(HfpEvent::CallDialing(number.clone()));
        self.transport.dial(&number).await
    }

    /// Answer the ringing call
    ///
    /// `CallAnswered` is emitted as soon as the transport takes the accept,
    /// so bus observers see the answer without waiting for the gateway's
    /// call indicator; the indicator confirms it later and is idempotent on
    /// the projection. A rejected accept emits nothing.
    pub async fn accept_call(&self) -> HfpResult<()> {
        self.require_connected().await?;
        info!(session = %self.session_id, "accepting call");
        self.transport.accept_call().await?;
        self.bus.emit(HfpEvent::CallAnswered);
        Ok(())
    }

    /// Hang up or reject the current call
    pub async fn end_call(&self) -> HfpResult<()> {
        self.require_connected().await?;
        info!(session = %self.session_id, "ending call");
        self.transport.end_call().await
    }

    /// Send one DTMF digit (`0`-`9`, `*` or `#`) into the call
    pub async fn send_dtmf(&self, digit: &str) -> HfpResult<()> {
        self.require_connected().await?;
        let mut chars = digit.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() || c == '*' || c == '#' => {
                self.transport.send_dtmf(c).await
            }
            _ => Err(HfpError::command_failed("DTMF must be a single character")),
        }
    }

    /// Open the SCO audio link; the state change arrives as `ScoConnected`
    pub async fn connect_audio(&self) -> HfpResult<()> {
        self.require_connected().await?;
        self.transport.connect_sco().await
    }

    /// Close the SCO audio link
    pub async fn disconnect_audio(&self) -> HfpResult<()> {
        self.require_connected().await?;
        self.transport.disconnect_sco().await
    }

    /// Pull call audio from the gateway to this machine
    pub async fn transfer_audio_to_computer(&self) -> HfpResult<()> {
        self.require_connected().await?;
        self.transport.transfer_audio_to_computer().await
    }

    /// Send a raw AT command, verbatim
    pub async fn send_at_command(&self, command: &str) -> HfpResult<()> {
        self.require_connected().await?;
        trace!(session = %self.session_id, command, "sending AT command");
        self.transport.send_at(command).await
    }

    /// Ask the gateway for its current call list
    ///
    /// The response lines come back through the transport and surface as
    /// call events.
    pub async fn request_call_list(&self) -> HfpResult<()> {
        self.send_at_command("+CLCC").await
    }

    /// Ask the gateway for the registered operator
    pub async fn request_operator(&self) -> HfpResult<()> {
        self.send_at_command("+COPS?").await
    }

    async fn require_connected(&self) -> HfpResult<()> {
        if self.state.snapshot().await.connection == ConnectionStatus::Connected {
            Ok(())
        } else {
            Err(HfpError::NotConnected)
        }
    }
}

async fn drain_loop(mut sub: EventSubscription, state: Arc<StateTracker>) {
    while let Some(event) = sub.recv().await {
        state.apply(&event).await;
    }
}

async fn translate_loop(mut rx: mpsc::UnboundedReceiver<TransportEvent>, bus: EventBus) {
    while let Some(event) = rx.recv().await {
        translate(event, &bus);
    }
}

/// Translate one transport callback into bus events
fn translate(event: TransportEvent, bus: &EventBus) {
    match event {
        TransportEvent::SlcConnected { status: 0 } => bus.emit(HfpEvent::Connected),
        TransportEvent::SlcConnected { status } => bus.emit(HfpEvent::ConnectFailed(Some(
            format!("gateway refused connection (status {})", status),
        ))),
        TransportEvent::SlcDisconnected { .. } => bus.emit(HfpEvent::Disconnected(None)),
        TransportEvent::CallSetup(mode) => {
            bus.emit(HfpEvent::CallSetup(mode));
            match mode {
                1 => bus.emit(HfpEvent::IncomingCall(None)),
                2 => bus.emit(HfpEvent::CallDialing(String::new())),
                3 => bus.emit(HfpEvent::CallAlerting),
                _ => {}
            }
        }
        TransportEvent::CallActive(active) => {
            bus.emit(HfpEvent::CallIndicator(active));
            bus.emit(if active {
                HfpEvent::CallActive
            } else {
                HfpEvent::CallEnded
            });
        }
        TransportEvent::CallHeld(mode) => {
            bus.emit(HfpEvent::CallHeldIndicator(mode));
            if mode > 0 {
                bus.emit(HfpEvent::CallHeld);
            }
        }
        TransportEvent::SignalStrength(value) => bus.emit(HfpEvent::SignalStrength(value)),
        TransportEvent::BatteryLevel(value) => bus.emit(HfpEvent::BatteryLevel(value)),
        TransportEvent::ServiceAvailable(available) => {
            bus.emit(HfpEvent::ServiceAvailable(available))
        }
        TransportEvent::Roaming(roaming) => bus.emit(HfpEvent::Roaming(roaming)),
        TransportEvent::IncomingCallFrom(number) => {
            bus.emit(HfpEvent::CallerId { number: number.clone(), name: None });
            bus.emit(HfpEvent::IncomingCall(Some(number)));
        }
        TransportEvent::ScoOpened => bus.emit(HfpEvent::ScoConnected),
        TransportEvent::ScoClosed => bus.emit(HfpEvent::ScoDisconnected),
        TransportEvent::AtResponse(line) => translate_at_line(&line, bus),
    }
}

/// Project a raw AT response line onto bus events; unparseable lines are
/// dropped silently
fn translate_at_line(line: &str, bus: &EventBus) {
    if let Some(name) = at::parse_cops(line) {
        bus.emit(HfpEvent::OperatorName(name));
        return;
    }
    if let Some((number, name)) = at::parse_clip(line) {
        bus.emit(HfpEvent::CallerId { number, name });
        return;
    }
    if let Some(call) = at::parse_clcc(line) {
        match call.status {
            CallStatus::Incoming => bus.emit(HfpEvent::IncomingCall(call.number)),
            CallStatus::Dialing => {
                bus.emit(HfpEvent::CallDialing(call.number.unwrap_or_default()))
            }
            CallStatus::Alerting => bus.emit(HfpEvent::CallAlerting),
            CallStatus::Active => bus.emit(HfpEvent::CallActive),
            CallStatus::Held => bus.emit(HfpEvent::CallHeld),
            CallStatus::Waiting => bus.emit(HfpEvent::CallWaiting(call.number)),
            CallStatus::Idle | CallStatus::Ended => {}
        }
        return;
    }
    trace!(line, "dropping unrecognized AT line");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(sub: &mut EventSubscription, n: usize) -> Vec<HfpEvent> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(sub.recv().await.expect("event"));
        }
        out
    }

    #[tokio::test]
    async fn slc_callbacks_translate_to_connection_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        translate(TransportEvent::SlcConnected { status: 0 }, &bus);
        translate(TransportEvent::SlcConnected { status: 12 }, &bus);
        translate(TransportEvent::SlcDisconnected { status: 0 }, &bus);

        let events = drain(&mut sub, 3).await;
        assert_eq!(events[0], HfpEvent::Connected);
        assert!(matches!(events[1], HfpEvent::ConnectFailed(Some(_))));
        assert_eq!(events[2], HfpEvent::Disconnected(None));
    }

    #[tokio::test]
    async fn callsetup_expands_to_setup_and_phase_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        translate(TransportEvent::CallSetup(1), &bus);
        assert_eq!(
            drain(&mut sub, 2).await,
            vec![HfpEvent::CallSetup(1), HfpEvent::IncomingCall(None)]
        );

        translate(TransportEvent::CallSetup(3), &bus);
        assert_eq!(
            drain(&mut sub, 2).await,
            vec![HfpEvent::CallSetup(3), HfpEvent::CallAlerting]
        );

        translate(TransportEvent::CallSetup(0), &bus);
        translate(TransportEvent::ScoOpened, &bus);
        assert_eq!(
            drain(&mut sub, 2).await,
            vec![HfpEvent::CallSetup(0), HfpEvent::ScoConnected]
        );
    }

    #[tokio::test]
    async fn call_indicator_expands_to_indicator_and_lifecycle_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        translate(TransportEvent::CallActive(true), &bus);
        translate(TransportEvent::CallActive(false), &bus);

        assert_eq!(
            drain(&mut sub, 4).await,
            vec![
                HfpEvent::CallIndicator(true),
                HfpEvent::CallActive,
                HfpEvent::CallIndicator(false),
                HfpEvent::CallEnded,
            ]
        );
    }

    #[tokio::test]
    async fn incoming_caller_produces_id_then_ring() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        translate(TransportEvent::IncomingCallFrom("+15551112222".into()), &bus);
        assert_eq!(
            drain(&mut sub, 2).await,
            vec![
                HfpEvent::CallerId { number: "+15551112222".into(), name: None },
                HfpEvent::IncomingCall(Some("+15551112222".into())),
            ]
        );
    }

    #[tokio::test]
    async fn at_lines_project_onto_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        translate_at_line("+COPS: 0,0,\"T-Mobile\"", &bus);
        translate_at_line("+CLCC: 1,1,5,0,0,\"5550000\",129", &bus);
        translate_at_line("+CLIP: \"5551234\",129,,,\"Grace\"", &bus);

        assert_eq!(
            drain(&mut sub, 3).await,
            vec![
                HfpEvent::OperatorName("T-Mobile".into()),
                HfpEvent::CallWaiting(Some("5550000".into())),
                HfpEvent::CallerId { number: "5551234".into(), name: Some("Grace".into()) },
            ]
        );
    }

    #[tokio::test]
    async fn unparseable_lines_emit_nothing() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        translate_at_line("OK", &bus);
        translate_at_line("+CLCC: bad", &bus);
        translate_at_line("+CLCC: 1,0,9,0,0", &bus);

        // a sentinel proves nothing else was emitted
        bus.emit(HfpEvent::Connected);
        assert_eq!(sub.recv().await, Some(HfpEvent::Connected));
    }
}
