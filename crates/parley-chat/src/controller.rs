//! Turn controller: validates input, runs the agent and records turns.

use parley_agent::Reasoner;
use parley_core::{ParleyConfig, RecognitionErrorPolicy, Turn};
use parley_speech::RecognitionError;

use crate::error::ChatError;
use crate::session::Session;
use crate::voice::{VoiceInput, VoiceOutput};

/// Behaviour switches for [`TurnController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Longest accepted typed message, in characters.
    pub max_input_chars: usize,
    /// Speak each agent reply through the voice output.
    pub speak_replies: bool,
    pub recognition_errors: RecognitionErrorPolicy,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            max_input_chars: 200,
            speak_replies: false,
            recognition_errors: RecognitionErrorPolicy::FeedToAgent,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &ParleyConfig) -> Self {
        Self {
            max_input_chars: config.chat.max_input_chars,
            speak_replies: config.voice.speak_replies,
            recognition_errors: config.voice.recognition_errors,
        }
    }
}

/// Owns the session and routes every user action through the agent.
///
/// All operations take `&mut self`: one turn runs at a time, and the
/// microphone and speaker are never shared between turns.
pub struct TurnController {
    session: Session,
    agent: Box<dyn Reasoner>,
    voice_input: Option<Box<dyn VoiceInput>>,
    voice_output: Option<Box<dyn VoiceOutput>>,
    options: ControllerOptions,
}

impl TurnController {
    pub fn new(agent: impl Reasoner + 'static, options: ControllerOptions) -> Self {
        Self {
            session: Session::new(),
            agent: Box::new(agent),
            voice_input: None,
            voice_output: None,
            options,
        }
    }

    pub fn with_voice_input(mut self, input: impl VoiceInput + 'static) -> Self {
        self.voice_input = Some(Box::new(input));
        self
    }

    pub fn with_voice_output(mut self, output: impl VoiceOutput + 'static) -> Self {
        self.voice_output = Some(Box::new(output));
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn has_voice_input(&self) -> bool {
        self.voice_input.is_some()
    }

    /// Replace the text-box contents.
    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.session.set_pending_input(text.into());
    }

    /// Send a typed message. On success returns the bot's turn.
    pub async fn submit_text(&mut self, input: &str) -> Result<Turn, ChatError> {
        if input.trim().is_empty() {
            tracing::debug!("Rejected empty message");
            return Err(ChatError::EmptyMessage);
        }
        let limit = self.options.max_input_chars;
        if input.chars().count() > limit {
            tracing::debug!(limit, "Rejected over-long message");
            return Err(ChatError::MessageTooLong(limit));
        }

        Ok(self.complete_turn(input.to_string()).await)
    }

    /// Send whatever is in the text box.
    pub async fn submit_pending(&mut self) -> Result<Turn, ChatError> {
        let input = self.session.pending_input().to_string();
        self.submit_text(&input).await
    }

    /// Listen for one utterance and send it.
    ///
    /// Recognition failures are either fed to the agent as text or
    /// returned, depending on [`ControllerOptions::recognition_errors`].
    pub async fn submit_voice(&mut self) -> Result<Turn, ChatError> {
        let voice = self
            .voice_input
            .as_mut()
            .ok_or(ChatError::VoiceUnavailable)?;

        let heard = match voice.listen().await {
            Ok(text) if text.trim().is_empty() => Err(RecognitionError::Unintelligible),
            other => other,
        };

        let utterance = match heard {
            Ok(text) => text,
            Err(e) => match self.options.recognition_errors {
                RecognitionErrorPolicy::FeedToAgent => {
                    tracing::info!("Speech not recognized, sending fallback text: {}", e);
                    e.fallback_text()
                }
                RecognitionErrorPolicy::Notice => {
                    tracing::info!("Speech not recognized: {}", e);
                    return Err(ChatError::Recognition(e));
                }
            },
        };

        Ok(self.complete_turn(utterance).await)
    }

    /// Forget the conversation: transcript, text box and agent memory.
    pub fn clear(&mut self) {
        let turns = self.session.len();
        self.session.clear();
        self.agent.reset();
        tracing::info!(session = %self.session.id(), turns, "Cleared conversation");
    }

    async fn complete_turn(&mut self, utterance: String) -> Turn {
        self.session.push(Turn::user(utterance.clone()));

        let (reply, succeeded) = match self.agent.run(&utterance).await {
            Ok(reply) => (reply, true),
            Err(e) => {
                tracing::warn!(kind = ?e.kind, "Agent failed: {}", e);
                (format!("An error occurred: {}", e), false)
            }
        };

        let turn = Turn::bot(reply);
        self.session.push(turn.clone());
        self.session.clear_pending_input();

        if succeeded && self.options.speak_replies {
            if let Some(output) = self.voice_output.as_mut() {
                output.speak(&turn.text).await;
            }
        }
        turn
    }
}
