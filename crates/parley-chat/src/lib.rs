//! Conversational turn handling for Parley.
//!
//! [`TurnController`] owns the [`Session`] and drives each typed or spoken
//! turn through the agent, recording both sides in the transcript.

pub mod controller;
pub mod error;
pub mod render;
pub mod session;
pub mod voice;

pub use controller::{ControllerOptions, TurnController};
pub use error::ChatError;
pub use session::Session;
pub use voice::{ListenerInput, ScriptedVoiceInput, SynthesizerOutput, VoiceInput, VoiceOutput};
