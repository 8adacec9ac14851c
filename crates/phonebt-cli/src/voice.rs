//! Voice pipeline seam
//!
//! Real-time voice I/O (capture, speech-to-text, synthesis) lives outside
//! this crate. An attached [`VoicePipeline`] synthesizes speech into the
//! call on request; in the other direction a pipeline delivers transcribed
//! caller speech by injecting
//! [`HfpEvent::CallerSpeech`](phonebt_hfp_core::HfpEvent::CallerSpeech)
//! through [`HfpEngine::inject_event`](phonebt_hfp_core::HfpEngine::inject_event).

use async_trait::async_trait;

use crate::error::ClientResult;

/// Text-to-speech into the active call
#[async_trait]
pub trait VoicePipeline: Send + Sync {
    /// Synthesize `text` and play it to the remote party
    ///
    /// Resolves when playback completes. Callers that must not wait spawn
    /// the call onto a detached task.
    async fn speak(&self, text: &str) -> ClientResult<()>;
}
