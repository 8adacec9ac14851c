//! Tool dispatch for external controllers
//!
//! This is the surface an AI agent (or any upstream controller) drives:
//! a uniform `execute(tool, inputs)` call over seven named tools, each
//! returning one JSON object with a boolean `success` plus either data
//! fields or an `error` string. Serialization is canonical: object keys
//! are lexicographically sorted (`serde_json`'s map is a `BTreeMap`), so
//! equal logical results produce identical bytes.
//!
//! The dispatcher applies policy around the engine: numbers are sanitized
//! before dialing, audio is proactively pulled to this machine on dial and
//! accept (failures swallowed), and system audio routing is requested on
//! accept and restored on hangup. Engine failures never propagate upward;
//! they are rendered into the result object.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use phonebt_hfp_core::{AudioStatus, HfpEngine, HfpEvent};

use crate::audio::AudioRouter;
use crate::voice::VoicePipeline;

/// Named-tool dispatcher over one engine
pub struct ToolDispatcher {
    engine: Arc<HfpEngine>,
    audio: Arc<dyn AudioRouter>,
    voice: Option<Arc<dyn VoicePipeline>>,
}

impl ToolDispatcher {
    /// Create a dispatcher without text-to-speech capability
    pub fn new(engine: Arc<HfpEngine>, audio: Arc<dyn AudioRouter>) -> Self {
        Self { engine, audio, voice: None }
    }

    /// Attach a voice pipeline, enabling `say_to_caller`
    pub fn with_voice(mut self, voice: Arc<dyn VoicePipeline>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Execute a named tool and return its result object
    ///
    /// Never fails: validation errors, unknown tools and engine errors all
    /// come back as `{"success": false, "error": ...}`.
    pub async fn execute(&self, tool: &str, args: &Value) -> Value {
        let result = self.run(tool, args).await;
        match result {
            Ok(mut fields) => {
                fields.insert("success".to_string(), Value::Bool(true));
                Value::Object(fields)
            }
            Err(message) => {
                debug!(tool, %message, "tool call failed");
                let mut fields = Map::new();
                fields.insert("error".to_string(), Value::String(message));
                fields.insert("success".to_string(), Value::Bool(false));
                Value::Object(fields)
            }
        }
    }

    async fn run(&self, tool: &str, args: &Value) -> Result<Map<String, Value>, String> {
        match tool {
            "dial_number" => {
                let number = sanitize_number(&require_str(args, "number")?);
                self.engine.dial(number.clone()).await.map_err(|e| e.to_string())?;
                // pull call audio to this machine up front; advisory only
                if let Err(e) = self.engine.transfer_audio_to_computer().await {
                    debug!(error = %e, "audio transfer on dial failed");
                }
                Ok(fields([("status", json!("dialing")), ("number", json!(number))]))
            }
            "accept_call" => {
                self.engine.accept_call().await.map_err(|e| e.to_string())?;
                if let Err(e) = self.engine.transfer_audio_to_computer().await {
                    debug!(error = %e, "audio transfer on accept failed");
                }
                if !self.audio.route_to_bluetooth_device().await {
                    debug!("audio routing request declined");
                }
                Ok(fields([("status", json!("answered"))]))
            }
            "end_call" => {
                self.engine.end_call().await.map_err(|e| e.to_string())?;
                self.audio.restore_previous_routing().await;
                Ok(fields([("status", json!("ended"))]))
            }
            "send_dtmf" => {
                let digit = require_str(args, "digit")?;
                self.engine.send_dtmf(&digit).await.map_err(|e| e.to_string())?;
                Ok(fields([("status", json!("sent")), ("digit", json!(digit))]))
            }
            "get_call_status" => {
                let state = self.engine.state().await;
                let mut out = fields([
                    ("call_state", json!(state.call.to_string())),
                    ("audio_connected", json!(state.audio == AudioStatus::Connected)),
                ]);
                if let Some(call) = &state.active_call {
                    out.insert("direction".to_string(), json!(call.direction.to_string()));
                    if let Some(number) = &call.number {
                        out.insert("number".to_string(), json!(number));
                    }
                    if let Some(duration) = call.duration() {
                        out.insert("duration".to_string(), json!(duration.as_secs()));
                    }
                }
                Ok(out)
            }
            "get_phone_status" => {
                let state = self.engine.state().await;
                match serde_json::to_value(&state.phone) {
                    Ok(Value::Object(map)) => Ok(map),
                    _ => Err("phone status unavailable".to_string()),
                }
            }
            "say_to_caller" => {
                let text = require_str(args, "text")?;
                let voice = self
                    .voice
                    .as_ref()
                    .ok_or_else(|| "Text-to-speech is not configured".to_string())?
                    .clone();
                let speech = text.clone();
                // return immediately; playback happens on a detached task
                tokio::spawn(async move {
                    if let Err(e) = voice.speak(&speech).await {
                        warn!(error = %e, "speech synthesis failed");
                    }
                });
                Ok(fields([("status", json!("speaking")), ("text", json!(text))]))
            }
            _ => Err(format!("Unknown tool: {}", tool)),
        }
    }

    /// Render an event as a prompt injection for the upstream controller
    ///
    /// Returns `None` for events with no conversational relevance (raw
    /// indicator deltas and the like).
    pub fn describe_event(event: &HfpEvent) -> Option<String> {
        let text = match event {
            HfpEvent::Connected => "Connected to the phone".to_string(),
            HfpEvent::Disconnected(_) => "Phone disconnected".to_string(),
            HfpEvent::IncomingCall(Some(number)) => format!("Incoming call from {}", number),
            HfpEvent::IncomingCall(None) => "Incoming call".to_string(),
            HfpEvent::CallerId { number, name: Some(name) } => {
                format!("Caller identified: {} ({})", name, number)
            }
            HfpEvent::CallDialing(number) if !number.is_empty() => {
                format!("Dialing {}", number)
            }
            HfpEvent::CallAlerting => "Remote phone is ringing".to_string(),
            HfpEvent::CallActive | HfpEvent::CallAnswered => "Call connected".to_string(),
            HfpEvent::CallHeld => "Call placed on hold".to_string(),
            HfpEvent::CallWaiting(Some(number)) => format!("Call waiting from {}", number),
            HfpEvent::CallWaiting(None) => "Call waiting".to_string(),
            HfpEvent::CallEnded => "Call ended".to_string(),
            HfpEvent::ScoConnected => "Call audio is on this computer".to_string(),
            HfpEvent::ScoDisconnected => "Call audio returned to the phone".to_string(),
            HfpEvent::CallerSpeech(text) => format!("Caller said: {}", text),
            HfpEvent::Error(message) => format!("Engine error: {}", message),
            _ => return None,
        };
        Some(text)
    }
}

/// Retain only the characters meaningful to a dialer: digits, `+`, `*`, `#`
pub fn sanitize_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#'))
        .collect()
}

fn require_str(args: &Value, name: &str) -> Result<String, String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| format!("Missing required parameter: {}", name))
}

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
