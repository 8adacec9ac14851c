//! # PhoneBT HFP core
//!
//! Protocol engine for the Hands-Free Profile client side: this crate owns
//! the service-level connection lifecycle against a paired phone (the audio
//! gateway), parses the AT indications the gateway sends, projects them into
//! authoritative call/audio/phone state, and fans events out to any number
//! of subscribers.
//!
//! The crate does no radio I/O of its own. Platform HFP drivers plug in
//! behind the [`BluetoothTransport`] trait and deliver their callbacks as
//! [`TransportEvent`]s; everything above that seam is portable.
//!
//! ## Basic flow
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phonebt_hfp_core::{HfpEngine, HfpEvent, BluetoothTransport};
//!
//! async fn example(transport: Arc<dyn BluetoothTransport>) -> phonebt_hfp_core::HfpResult<()> {
//!     let engine = HfpEngine::new(transport);
//!     engine.start();
//!
//!     let mut events = engine.subscribe();
//!     engine.connect().await?;
//!     engine.dial("+15551234567").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             HfpEvent::CallActive => println!("call is up"),
//!             HfpEvent::CallEnded => break,
//!             _ => {}
//!         }
//!     }
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod at;
pub mod call;
pub mod engine;
pub mod error;
pub mod events;
pub mod recovery;
pub mod state;
pub mod transport;

pub use call::{CallDirection, CallInfo, CallStatus, PhoneStatus};
pub use engine::{EngineConfig, HfpEngine, DEFAULT_CONNECT_TIMEOUT};
pub use error::{HfpError, HfpResult};
pub use events::{EventBus, EventSubscription, HfpEvent};
pub use recovery::{retry_with_backoff, RetryConfig};
pub use state::{AudioStatus, ConnectionStatus, HfpState, StateTracker};
pub use transport::{BluetoothTransport, TransportEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
