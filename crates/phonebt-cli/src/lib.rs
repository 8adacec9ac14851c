//! # PhoneBT client
//!
//! The desktop-facing half of PhoneBT: it wires the HFP protocol engine
//! from `phonebt-hfp-core` to the things around it. That means the
//! named-tool surface an AI agent drives, the OS audio-routing seam, the
//! optional voice pipeline, a simulated gateway for driverless operation,
//! and the interactive shell.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phonebt_hfp_core::HfpEngine;
//! use phonebt_cli::{audio::SystemAudioRouter, gateway::SimulatedGateway, tools::ToolDispatcher};
//!
//! # async fn example() {
//! let gateway = SimulatedGateway::new();
//! let engine = HfpEngine::new(Arc::new(gateway.clone()));
//! engine.start();
//!
//! let dispatcher = ToolDispatcher::new(engine.clone(), Arc::new(SystemAudioRouter));
//! let result = dispatcher
//!     .execute("dial_number", &serde_json::json!({ "number": "+1 (555) 123-4567" }))
//!     .await;
//! println!("{}", result);
//! # }
//! ```

pub mod audio;
pub mod cli;
pub mod error;
pub mod gateway;
pub mod tools;
pub mod voice;

pub use audio::{AudioDeviceInfo, AudioRouter, SystemAudioRouter};
pub use cli::{PairedDevice, Shell};
pub use error::{ClientError, ClientResult};
pub use gateway::SimulatedGateway;
pub use tools::ToolDispatcher;
pub use voice::VoicePipeline;
