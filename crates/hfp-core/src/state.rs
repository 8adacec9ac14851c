//! Authoritative projection of connection, call, audio and phone state
//!
//! The tracker is driven exclusively by [`HfpEvent`]s, applied one at a time
//! under an exclusive lock by a single drain task. Reads take a brief shared
//! lock and return a by-value snapshot. The lock is a leaf lock: it is never
//! held across an await point or a call out of this module.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::call::{clamp_indicator, CallDirection, CallInfo, CallStatus, PhoneStatus};
use crate::events::HfpEvent;

/// Service-level connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No link to a gateway
    Disconnected,
    /// SLC establishment in flight
    Connecting,
    /// SLC established
    Connected,
}

/// SCO audio link state, independent of call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioStatus {
    /// No SCO link
    Disconnected,
    /// SCO link up
    Connected,
}

/// The engine's single state aggregate
///
/// `call` mirrors `active_call.status` whenever a call exists and is `Idle`
/// otherwise; the pair is updated atomically so the mirror never skews.
#[derive(Debug, Clone, PartialEq)]
pub struct HfpState {
    /// Service-level connection state
    pub connection: ConnectionStatus,
    /// Current call status, `Idle` when no call exists
    pub call: CallStatus,
    /// SCO audio link state
    pub audio: AudioStatus,
    /// Replicated phone indicators
    pub phone: PhoneStatus,
    /// The in-progress call, when one exists
    pub active_call: Option<CallInfo>,
}

impl Default for HfpState {
    fn default() -> Self {
        Self {
            connection: ConnectionStatus::Disconnected,
            call: CallStatus::Idle,
            audio: AudioStatus::Disconnected,
            phone: PhoneStatus::default(),
            active_call: None,
        }
    }
}

/// Single-writer state machine over [`HfpState`]
#[derive(Debug, Default)]
pub struct StateTracker {
    state: RwLock<HfpState>,
}

impl StateTracker {
    /// Create a tracker in the zero state
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a by-value snapshot of the current state
    pub async fn snapshot(&self) -> HfpState {
        self.state.read().await.clone()
    }

    /// Mark SLC establishment as in flight
    ///
    /// Only leaves `Disconnected`; events arriving concurrently settle the
    /// outcome.
    pub async fn mark_connecting(&self) {
        let mut state = self.state.write().await;
        if state.connection == ConnectionStatus::Disconnected {
            state.connection = ConnectionStatus::Connecting;
        }
    }

    /// Apply one event to the aggregate
    ///
    /// The transition table is exhaustive; events without a listed effect
    /// leave the state unchanged. Gateway-originated call, audio and
    /// indicator events are ignored unless the SLC is established.
    pub async fn apply(&self, event: &HfpEvent) {
        let mut state = self.state.write().await;
        match event {
            HfpEvent::Connected => {
                state.connection = ConnectionStatus::Connected;
            }
            HfpEvent::Disconnected(_) | HfpEvent::ConnectFailed(_) => {
                *state = HfpState::default();
            }
            _ => {
                if state.connection != ConnectionStatus::Connected {
                    return;
                }
                Self::apply_connected(&mut state, event);
            }
        }
    }

    fn apply_connected(state: &mut HfpState, event: &HfpEvent) {
        match event {
            HfpEvent::IncomingCall(number) => {
                ensure_call(state, CallDirection::Incoming, CallStatus::Incoming, number.clone());
            }
            HfpEvent::CallDialing(number) => {
                let number = (!number.is_empty()).then(|| number.clone());
                ensure_call(state, CallDirection::Outgoing, CallStatus::Dialing, number);
            }
            HfpEvent::CallAlerting => {
                ensure_call(state, CallDirection::Outgoing, CallStatus::Alerting, None);
            }
            HfpEvent::CallActive => {
                ensure_call(state, CallDirection::Outgoing, CallStatus::Active, None);
                mark_connected(state);
            }
            HfpEvent::CallAnswered => {
                ensure_call(state, CallDirection::Incoming, CallStatus::Active, None);
                mark_connected(state);
            }
            HfpEvent::CallHeld => {
                ensure_call(state, CallDirection::Outgoing, CallStatus::Held, None);
            }
            HfpEvent::CallEnded => {
                state.call = CallStatus::Idle;
                state.active_call = None;
            }
            HfpEvent::CallSetup(mode) => match mode {
                1 => ensure_call(state, CallDirection::Incoming, CallStatus::Incoming, None),
                2 => ensure_call(state, CallDirection::Outgoing, CallStatus::Dialing, None),
                3 => ensure_call(state, CallDirection::Outgoing, CallStatus::Alerting, None),
                // resolution of callsetup 0 arrives via the call indicator
                _ => {}
            },
            HfpEvent::CallIndicator(true) => {
                if state.call != CallStatus::Active {
                    ensure_call(state, CallDirection::Outgoing, CallStatus::Active, None);
                    mark_connected(state);
                }
            }
            HfpEvent::CallIndicator(false) => {
                state.call = CallStatus::Idle;
                state.active_call = None;
            }
            HfpEvent::CallHeldIndicator(0) => {
                // a resume is only meaningful for a held call
                if state.call == CallStatus::Held {
                    ensure_call(state, CallDirection::Outgoing, CallStatus::Active, None);
                    mark_connected(state);
                }
            }
            HfpEvent::CallHeldIndicator(_) => {
                ensure_call(state, CallDirection::Outgoing, CallStatus::Held, None);
            }
            HfpEvent::ScoConnected => {
                state.audio = AudioStatus::Connected;
            }
            HfpEvent::ScoDisconnected => {
                state.audio = AudioStatus::Disconnected;
            }
            HfpEvent::SignalStrength(value) => {
                state.phone.signal_strength = clamp_indicator(*value);
            }
            HfpEvent::BatteryLevel(value) => {
                state.phone.battery_level = clamp_indicator(*value);
            }
            HfpEvent::ServiceAvailable(available) => {
                state.phone.service_available = *available;
            }
            HfpEvent::Roaming(roaming) => {
                state.phone.roaming = *roaming;
            }
            HfpEvent::OperatorName(name) => {
                state.phone.operator_name = Some(name.clone());
            }
            HfpEvent::CallerId { number, .. } => {
                if let Some(call) = state.active_call.as_mut() {
                    call.number = Some(number.clone());
                }
            }
            // no state effect: connection events are handled by the caller,
            // the rest carry no projection
            _ => {}
        }
    }
}

/// Update the call projection, creating the call record on the first event
/// that implies one
fn ensure_call(
    state: &mut HfpState,
    direction: CallDirection,
    status: CallStatus,
    number: Option<String>,
) {
    match state.active_call.as_mut() {
        Some(call) => {
            call.status = status;
            if call.number.is_none() {
                call.number = number;
            }
        }
        None => {
            state.active_call = Some(CallInfo::new(direction, status, number));
        }
    }
    state.call = status;
}

fn mark_connected(state: &mut HfpState) {
    if let Some(call) = state.active_call.as_mut() {
        call.mark_connected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn apply_all(tracker: &StateTracker, events: &[HfpEvent]) {
        for event in events {
            tracker.apply(event).await;
            assert_invariants(&tracker.snapshot().await);
        }
    }

    /// The aggregate's invariants, checked after every event application
    fn assert_invariants(state: &HfpState) {
        if state.connection == ConnectionStatus::Disconnected {
            assert_eq!(state.call, CallStatus::Idle);
            assert_eq!(state.audio, AudioStatus::Disconnected);
            assert!(state.active_call.is_none());
        }
        assert_eq!(state.call == CallStatus::Idle, state.active_call.is_none());
        if let Some(call) = &state.active_call {
            assert_eq!(call.status, state.call);
        }
        assert!(state.phone.signal_strength <= 5);
        assert!(state.phone.battery_level <= 5);
    }

    #[tokio::test]
    async fn outgoing_call_happy_path() {
        let tracker = StateTracker::new();

        apply_all(&tracker, &[HfpEvent::Connected]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.connection, ConnectionStatus::Connected);
        assert_eq!(state.call, CallStatus::Idle);

        apply_all(&tracker, &[HfpEvent::CallDialing("+15551234567".into())]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Dialing);
        let call = state.active_call.unwrap();
        assert_eq!(call.direction, CallDirection::Outgoing);
        assert_eq!(call.number.as_deref(), Some("+15551234567"));
        assert!(call.connected_at.is_none());

        apply_all(&tracker, &[HfpEvent::CallAlerting]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Alerting);
        assert!(state.active_call.unwrap().connected_at.is_none());

        apply_all(&tracker, &[HfpEvent::CallActive]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Active);
        assert!(state.active_call.unwrap().connected_at.is_some());

        apply_all(&tracker, &[HfpEvent::CallEnded]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Idle);
        assert!(state.active_call.is_none());
        assert_eq!(state.connection, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn incoming_call_accepted() {
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::Connected,
                HfpEvent::IncomingCall(Some("+15559876543".into())),
            ],
        )
        .await;

        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Incoming);
        let call = state.active_call.unwrap();
        assert_eq!(call.direction, CallDirection::Incoming);
        assert_eq!(call.number.as_deref(), Some("+15559876543"));

        apply_all(&tracker, &[HfpEvent::CallAnswered]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Active);
        assert!(state.active_call.unwrap().connected_at.is_some());

        apply_all(&tracker, &[HfpEvent::CallEnded]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Idle);
        assert!(state.active_call.is_none());
    }

    #[tokio::test]
    async fn transport_loss_tears_everything_down() {
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::Connected,
                HfpEvent::CallActive,
                HfpEvent::ScoConnected,
            ],
        )
        .await;
        let state = tracker.snapshot().await;
        assert_eq!(state.audio, AudioStatus::Connected);
        assert_eq!(state.call, CallStatus::Active);

        apply_all(&tracker, &[HfpEvent::Disconnected(None)]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.connection, ConnectionStatus::Disconnected);
        assert_eq!(state.call, CallStatus::Idle);
        assert_eq!(state.audio, AudioStatus::Disconnected);
        assert!(state.active_call.is_none());
    }

    #[tokio::test]
    async fn hold_then_resume_keeps_connected_at() {
        let tracker = StateTracker::new();
        apply_all(&tracker, &[HfpEvent::Connected, HfpEvent::CallActive]).await;
        let connected_at = tracker.snapshot().await.active_call.unwrap().connected_at;
        assert!(connected_at.is_some());

        apply_all(&tracker, &[HfpEvent::CallHeldIndicator(1)]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Held);

        apply_all(&tracker, &[HfpEvent::CallHeldIndicator(0)]).await;
        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Active);
        assert_eq!(state.active_call.unwrap().connected_at, connected_at);
    }

    #[tokio::test]
    async fn resume_without_held_call_is_a_no_op() {
        let tracker = StateTracker::new();
        apply_all(&tracker, &[HfpEvent::Connected, HfpEvent::CallActive]).await;

        apply_all(&tracker, &[HfpEvent::CallHeldIndicator(0)]).await;
        assert_eq!(tracker.snapshot().await.call, CallStatus::Active);
    }

    #[tokio::test]
    async fn callsetup_creates_default_call() {
        let tracker = StateTracker::new();
        apply_all(&tracker, &[HfpEvent::Connected, HfpEvent::CallSetup(1)]).await;

        let state = tracker.snapshot().await;
        assert_eq!(state.call, CallStatus::Incoming);
        let call = state.active_call.unwrap();
        assert_eq!(call.direction, CallDirection::Incoming);
        assert_eq!(call.number, None);

        // callsetup 0 resolves via the call indicator, not by itself
        apply_all(&tracker, &[HfpEvent::CallSetup(0)]).await;
        assert_eq!(tracker.snapshot().await.call, CallStatus::Incoming);

        apply_all(&tracker, &[HfpEvent::CallIndicator(false)]).await;
        assert_eq!(tracker.snapshot().await.call, CallStatus::Idle);
    }

    #[tokio::test]
    async fn call_indicator_true_promotes_to_active_once() {
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::Connected,
                HfpEvent::CallSetup(2),
                HfpEvent::CallIndicator(true),
            ],
        )
        .await;
        let first = tracker.snapshot().await.active_call.unwrap().connected_at;
        assert!(first.is_some());

        apply_all(&tracker, &[HfpEvent::CallIndicator(true)]).await;
        assert_eq!(tracker.snapshot().await.active_call.unwrap().connected_at, first);
    }

    #[tokio::test]
    async fn caller_id_fills_in_number() {
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::Connected,
                HfpEvent::IncomingCall(None),
                HfpEvent::CallerId { number: "+15550001111".into(), name: Some("Ada".into()) },
            ],
        )
        .await;
        let call = tracker.snapshot().await.active_call.unwrap();
        assert_eq!(call.number.as_deref(), Some("+15550001111"));
    }

    #[tokio::test]
    async fn indicators_update_and_clamp() {
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::Connected,
                HfpEvent::SignalStrength(4),
                HfpEvent::BatteryLevel(200),
                HfpEvent::ServiceAvailable(true),
                HfpEvent::Roaming(true),
                HfpEvent::OperatorName("T-Mobile".into()),
            ],
        )
        .await;
        let phone = tracker.snapshot().await.phone;
        assert_eq!(phone.signal_strength, 4);
        assert_eq!(phone.battery_level, 5);
        assert!(phone.service_available);
        assert!(phone.roaming);
        assert_eq!(phone.operator_name.as_deref(), Some("T-Mobile"));
    }

    #[tokio::test]
    async fn gateway_events_ignored_without_slc() {
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::IncomingCall(Some("5551234".into())),
                HfpEvent::ScoConnected,
                HfpEvent::SignalStrength(3),
            ],
        )
        .await;
        let state = tracker.snapshot().await;
        assert_eq!(state, HfpState::default());
    }

    #[tokio::test]
    async fn disconnect_resets_phone_status() {
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::Connected,
                HfpEvent::OperatorName("Carrier".into()),
                HfpEvent::Disconnected(Some("link lost".into())),
            ],
        )
        .await;
        assert_eq!(tracker.snapshot().await.phone, PhoneStatus::default());
    }

    #[tokio::test]
    async fn waiting_call_reported_via_clcc_projection() {
        // callWaiting itself carries no transition; a waiting call surfaces
        // through the call-list query instead
        let tracker = StateTracker::new();
        apply_all(
            &tracker,
            &[
                HfpEvent::Connected,
                HfpEvent::CallActive,
                HfpEvent::CallWaiting(Some("5550000".into())),
            ],
        )
        .await;
        assert_eq!(tracker.snapshot().await.call, CallStatus::Active);
    }
}
