//! Transport seam to the platform HFP link driver
//!
//! The engine never touches a radio. It drives a [`BluetoothTransport`]
//! capability and receives the driver's callbacks as [`TransportEvent`]s
//! over a channel registered with [`BluetoothTransport::set_event_sender`].
//! Callbacks are expected to do minimal work on the driver's own thread:
//! build the event, send it, return.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::HfpResult;

/// Callback notifications from the platform HFP driver
///
/// Status codes follow the platform convention of `0` for success.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// SLC establishment finished
    SlcConnected {
        /// 0 on success, a driver status code otherwise
        status: i32,
    },
    /// SLC was closed or lost
    SlcDisconnected {
        /// Driver status code for the closure
        status: i32,
    },
    /// callsetup indicator changed, 0..=3
    CallSetup(u8),
    /// call indicator changed
    CallActive(bool),
    /// callheld indicator changed, 0..=2
    CallHeld(u8),
    /// Signal strength indication
    SignalStrength(u8),
    /// Battery charge indication
    BatteryLevel(u8),
    /// Service availability indication
    ServiceAvailable(bool),
    /// Roaming indication
    Roaming(bool),
    /// Incoming call with caller number
    IncomingCallFrom(String),
    /// SCO audio link opened
    ScoOpened,
    /// SCO audio link closed
    ScoClosed,
    /// Raw AT response line surfaced by the driver
    AtResponse(String),
}

/// Capability set required from the platform HFP library
///
/// Implementations own the actual Bluetooth session. All methods report
/// platform failures as [`HfpError::TransportError`](crate::HfpError);
/// state changes they cause are observed through [`TransportEvent`]s, never
/// through return values.
#[async_trait]
pub trait BluetoothTransport: Send + Sync {
    /// Begin SLC establishment with the paired gateway
    async fn connect(&self) -> HfpResult<()>;

    /// Close the SLC, best-effort
    async fn disconnect(&self) -> HfpResult<()>;

    /// Whether the driver currently holds an established SLC
    fn is_connected(&self) -> bool;

    /// Place an outgoing call
    async fn dial(&self, number: &str) -> HfpResult<()>;

    /// Answer the ringing call
    async fn accept_call(&self) -> HfpResult<()>;

    /// Hang up or reject the current call
    async fn end_call(&self) -> HfpResult<()>;

    /// Send one DTMF digit into the active call
    async fn send_dtmf(&self, digit: char) -> HfpResult<()>;

    /// Open the SCO audio link
    async fn connect_sco(&self) -> HfpResult<()>;

    /// Close the SCO audio link
    async fn disconnect_sco(&self) -> HfpResult<()>;

    /// Pull call audio from the gateway to this machine
    async fn transfer_audio_to_computer(&self) -> HfpResult<()>;

    /// Send a raw AT command, verbatim
    async fn send_at(&self, command: &str) -> HfpResult<()>;

    /// Register the channel on which callbacks are delivered
    fn set_event_sender(&self, sender: mpsc::UnboundedSender<TransportEvent>);
}

/// Scriptable in-memory transport for engine tests
///
/// Records every command it is asked to perform and lets tests push
/// [`TransportEvent`]s as if a driver produced them.
pub mod mock {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::HfpError;

    /// Test double for [`BluetoothTransport`]
    #[derive(Debug, Default)]
    pub struct MockTransport {
        sender: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
        commands: Mutex<Vec<String>>,
        /// Whether `connect()` completes the SLC by itself
        auto_connect: AtomicBool,
        /// Scripted SLC rejections remaining before `connect()` succeeds
        connect_failures: AtomicU32,
        connected: AtomicBool,
    }

    impl MockTransport {
        /// A transport whose `connect()` immediately reports an established SLC
        pub fn auto_connecting() -> Self {
            let transport = Self::default();
            transport.auto_connect.store(true, Ordering::SeqCst);
            transport
        }

        /// A transport that stays silent after `connect()`, for timeout tests
        pub fn silent() -> Self {
            Self::default()
        }

        /// A transport that rejects the first `failures` SLC attempts, then
        /// connects
        pub fn failing_connects(failures: u32) -> Self {
            let transport = Self::auto_connecting();
            transport.connect_failures.store(failures, Ordering::SeqCst);
            transport
        }

        /// Push a driver callback into the engine
        pub fn push(&self, event: TransportEvent) {
            if let TransportEvent::SlcConnected { status: 0 } = &event {
                self.connected.store(true, Ordering::SeqCst);
            }
            if let TransportEvent::SlcDisconnected { .. } = &event {
                self.connected.store(false, Ordering::SeqCst);
            }
            let sender = self.sender.lock().unwrap();
            if let Some(sender) = sender.as_ref() {
                let _ = sender.send(event);
            }
        }

        /// Commands issued so far, in order
        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }

        fn record(&self, command: impl Into<String>) {
            self.commands.lock().unwrap().push(command.into());
        }
    }

    #[async_trait]
    impl BluetoothTransport for MockTransport {
        async fn connect(&self) -> HfpResult<()> {
            self.record("connect");
            if self
                .connect_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                self.push(TransportEvent::SlcConnected { status: 1 });
            } else if self.auto_connect.load(Ordering::SeqCst) {
                self.push(TransportEvent::SlcConnected { status: 0 });
            }
            Ok(())
        }

        async fn disconnect(&self) -> HfpResult<()> {
            self.record("disconnect");
            if self.connected.swap(false, Ordering::SeqCst) {
                self.push(TransportEvent::SlcDisconnected { status: 0 });
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn dial(&self, number: &str) -> HfpResult<()> {
            self.record(format!("dial {}", number));
            Ok(())
        }

        async fn accept_call(&self) -> HfpResult<()> {
            self.record("accept");
            Ok(())
        }

        async fn end_call(&self) -> HfpResult<()> {
            self.record("end");
            Ok(())
        }

        async fn send_dtmf(&self, digit: char) -> HfpResult<()> {
            self.record(format!("dtmf {}", digit));
            Ok(())
        }

        async fn connect_sco(&self) -> HfpResult<()> {
            self.record("connect_sco");
            self.push(TransportEvent::ScoOpened);
            Ok(())
        }

        async fn disconnect_sco(&self) -> HfpResult<()> {
            self.record("disconnect_sco");
            self.push(TransportEvent::ScoClosed);
            Ok(())
        }

        async fn transfer_audio_to_computer(&self) -> HfpResult<()> {
            self.record("transfer_audio");
            if !self.connected.load(Ordering::SeqCst) {
                return Err(HfpError::TransportError { code: -1 });
            }
            Ok(())
        }

        async fn send_at(&self, command: &str) -> HfpResult<()> {
            self.record(format!("at {}", command));
            Ok(())
        }

        fn set_event_sender(&self, sender: mpsc::UnboundedSender<TransportEvent>) {
            *self.sender.lock().unwrap() = Some(sender);
        }
    }
}
