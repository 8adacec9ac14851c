//! Simulated audio gateway
//!
//! An in-process [`BluetoothTransport`] that behaves like a paired phone:
//! it completes the SLC handshake, pushes indicator updates, walks outgoing
//! calls through dialing, alerting and active, rings on demand, and answers
//! `+CLCC`/`+COPS?` queries. It exists so the shell and the integration
//! tests can drive the whole engine without a platform HFP driver; real
//! drivers replace it behind the same trait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use phonebt_hfp_core::{BluetoothTransport, HfpError, HfpResult, TransportEvent};

/// Delay between simulated call-progress steps
const PROGRESS_STEP: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq)]
enum CallPhase {
    Dialing,
    Ringing,
    Active,
}

#[derive(Debug, Clone)]
struct SimulatedCall {
    number: String,
    phase: CallPhase,
    incoming: bool,
}

#[derive(Debug)]
struct GatewayInner {
    sender: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    connected: AtomicBool,
    call: Mutex<Option<SimulatedCall>>,
    operator: String,
}

impl GatewayInner {
    fn push(&self, event: TransportEvent) {
        let sender = self.sender.lock().unwrap();
        if let Some(sender) = sender.as_ref() {
            let _ = sender.send(event);
        }
    }

    fn require_connected(&self) -> HfpResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HfpError::TransportError { code: -1 })
        }
    }
}

/// The simulated phone
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    inner: Arc<GatewayInner>,
}

impl SimulatedGateway {
    /// Create a gateway registered on a simulated carrier
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                sender: Mutex::new(None),
                connected: AtomicBool::new(false),
                call: Mutex::new(None),
                operator: "Simulated Wireless".to_string(),
            }),
        }
    }

    /// Simulate an incoming call from `number`
    pub fn ring(&self, number: impl Into<String>) {
        let number = number.into();
        *self.inner.call.lock().unwrap() = Some(SimulatedCall {
            number: number.clone(),
            phase: CallPhase::Ringing,
            incoming: true,
        });
        self.inner.push(TransportEvent::CallSetup(1));
        self.inner.push(TransportEvent::IncomingCallFrom(number));
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BluetoothTransport for SimulatedGateway {
    async fn connect(&self) -> HfpResult<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(PROGRESS_STEP).await;
            inner.connected.store(true, Ordering::SeqCst);
            inner.push(TransportEvent::SlcConnected { status: 0 });
            inner.push(TransportEvent::ServiceAvailable(true));
            inner.push(TransportEvent::SignalStrength(4));
            inner.push(TransportEvent::BatteryLevel(5));
            inner.push(TransportEvent::Roaming(false));
        });
        Ok(())
    }

    async fn disconnect(&self) -> HfpResult<()> {
        if self.inner.connected.swap(false, Ordering::SeqCst) {
            *self.inner.call.lock().unwrap() = None;
            self.inner.push(TransportEvent::SlcDisconnected { status: 0 });
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn dial(&self, number: &str) -> HfpResult<()> {
        self.inner.require_connected()?;
        *self.inner.call.lock().unwrap() = Some(SimulatedCall {
            number: number.to_string(),
            phase: CallPhase::Dialing,
            incoming: false,
        });

        // walk the call through the gateway's setup phases
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.push(TransportEvent::CallSetup(2));
            tokio::time::sleep(PROGRESS_STEP).await;
            {
                let mut call = inner.call.lock().unwrap();
                match call.as_mut() {
                    Some(call) if call.phase == CallPhase::Dialing => {
                        call.phase = CallPhase::Ringing;
                    }
                    _ => return,
                }
            }
            inner.push(TransportEvent::CallSetup(3));
            tokio::time::sleep(PROGRESS_STEP).await;
            {
                let mut call = inner.call.lock().unwrap();
                match call.as_mut() {
                    Some(call) if call.phase == CallPhase::Ringing => {
                        call.phase = CallPhase::Active;
                    }
                    _ => return,
                }
            }
            inner.push(TransportEvent::CallSetup(0));
            inner.push(TransportEvent::CallActive(true));
        });
        Ok(())
    }

    async fn accept_call(&self) -> HfpResult<()> {
        self.inner.require_connected()?;
        let mut call = self.inner.call.lock().unwrap();
        match call.as_mut() {
            Some(call) if call.incoming && call.phase == CallPhase::Ringing => {
                call.phase = CallPhase::Active;
                self.inner.push(TransportEvent::CallSetup(0));
                self.inner.push(TransportEvent::CallActive(true));
                Ok(())
            }
            _ => Err(HfpError::TransportError { code: -2 }),
        }
    }

    async fn end_call(&self) -> HfpResult<()> {
        self.inner.require_connected()?;
        let had_call = self.inner.call.lock().unwrap().take().is_some();
        if had_call {
            self.inner.push(TransportEvent::CallSetup(0));
            self.inner.push(TransportEvent::CallActive(false));
        }
        Ok(())
    }

    async fn send_dtmf(&self, digit: char) -> HfpResult<()> {
        self.inner.require_connected()?;
        debug!(%digit, "simulated gateway received DTMF");
        Ok(())
    }

    async fn connect_sco(&self) -> HfpResult<()> {
        self.inner.require_connected()?;
        self.inner.push(TransportEvent::ScoOpened);
        Ok(())
    }

    async fn disconnect_sco(&self) -> HfpResult<()> {
        self.inner.require_connected()?;
        self.inner.push(TransportEvent::ScoClosed);
        Ok(())
    }

    async fn transfer_audio_to_computer(&self) -> HfpResult<()> {
        self.inner.require_connected()?;
        self.inner.push(TransportEvent::ScoOpened);
        Ok(())
    }

    async fn send_at(&self, command: &str) -> HfpResult<()> {
        self.inner.require_connected()?;
        match command {
            "+CLCC" => {
                let call = self.inner.call.lock().unwrap().clone();
                if let Some(call) = call {
                    let stat = match (call.incoming, call.phase) {
                        (_, CallPhase::Active) => 0,
                        (false, CallPhase::Dialing) => 2,
                        (false, CallPhase::Ringing) => 3,
                        (true, _) => 4,
                    };
                    let dir = if call.incoming { 1 } else { 0 };
                    self.inner.push(TransportEvent::AtResponse(format!(
                        "+CLCC: 1,{},{},0,0,\"{}\",145",
                        dir, stat, call.number
                    )));
                }
            }
            "+COPS?" => {
                self.inner.push(TransportEvent::AtResponse(format!(
                    "+COPS: 0,0,\"{}\"",
                    self.inner.operator
                )));
            }
            other => debug!(command = other, "simulated gateway ignoring AT command"),
        }
        Ok(())
    }

    fn set_event_sender(&self, sender: mpsc::UnboundedSender<TransportEvent>) {
        *self.inner.sender.lock().unwrap() = Some(sender);
    }
}
