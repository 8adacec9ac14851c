//! Call and phone indicator types
//!
//! This module defines the data carried by the engine's state projection:
//! the single in-progress call (mirroring the gateway's CLCC numbering) and
//! the phone indicators replicated from +CIEV-style indications.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a call (from the hands-free unit's perspective)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Call initiated by this side
    Outgoing,
    /// Call received from the network
    Incoming,
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallDirection::Outgoing => write!(f, "outgoing"),
            CallDirection::Incoming => write!(f, "incoming"),
        }
    }
}

/// Current status of a call
///
/// The values mirror the CLCC `stat` field where one exists; `Ended` is a
/// terminal marker used while tearing a call down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// No call in progress
    Idle,
    /// Outgoing call, number sent to the network
    Dialing,
    /// Outgoing call, remote party is being alerted
    Alerting,
    /// Incoming call ringing locally
    Incoming,
    /// Call is up
    Active,
    /// Call is on hold
    Held,
    /// Third-party call waiting
    Waiting,
    /// Call has ended
    Ended,
}

impl CallStatus {
    /// Check if a call in this status is still in progress
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, CallStatus::Idle | CallStatus::Ended)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallStatus::Idle => "idle",
            CallStatus::Dialing => "dialing",
            CallStatus::Alerting => "alerting",
            CallStatus::Incoming => "incoming",
            CallStatus::Active => "active",
            CallStatus::Held => "held",
            CallStatus::Waiting => "waiting",
            CallStatus::Ended => "ended",
        };
        write!(f, "{}", s)
    }
}

/// Information about a single call
///
/// `index` matches the gateway's 1-based CLCC numbering. `connected_at` is
/// monotonic and set exactly once, on the first transition into `Active`; it
/// survives hold/resume and is only discarded with the call itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    /// 1-based call index, matching the gateway's CLCC numbering
    pub index: u32,
    /// Direction of the call
    pub direction: CallDirection,
    /// Current status of the call
    pub status: CallStatus,
    /// Remote party number, when known
    pub number: Option<String>,
    /// When the call first became active
    pub connected_at: Option<Instant>,
    /// When this call record was created
    pub created_at: DateTime<Utc>,
}

impl CallInfo {
    /// Create a new call record in the given initial status
    pub fn new(direction: CallDirection, status: CallStatus, number: Option<String>) -> Self {
        Self {
            index: 1,
            direction,
            status,
            number,
            connected_at: None,
            created_at: Utc::now(),
        }
    }

    /// Time spent connected, if the call has ever been active
    pub fn duration(&self) -> Option<Duration> {
        self.connected_at.map(|t| t.elapsed())
    }

    /// Record the first transition into `Active`; later calls are no-ops
    pub fn mark_connected(&mut self) {
        if self.connected_at.is_none() {
            self.connected_at = Some(Instant::now());
        }
    }
}

/// Phone indicators replicated from the gateway
///
/// Integer indicators are clamped to `0..=5` at the point they are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhoneStatus {
    /// Signal strength, 0..=5
    pub signal_strength: u8,
    /// Battery charge level, 0..=5
    pub battery_level: u8,
    /// Whether cellular service is available
    pub service_available: bool,
    /// Registered network operator, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
    /// Whether the phone is roaming
    pub roaming: bool,
}

/// Largest value an integer indicator may take
pub(crate) const INDICATOR_MAX: u8 = 5;

pub(crate) fn clamp_indicator(value: u8) -> u8 {
    value.min(INDICATOR_MAX)
}
