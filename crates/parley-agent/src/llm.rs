//! Language model abstraction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::AgentError;

/// Author of a message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMessage {
    pub role: Role,
    pub text: String,
}

impl ModelMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// One text-generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<ModelMessage>,
    /// Overrides the client's configured temperature when set.
    pub temperature: Option<f32>,
    /// Generation halts before emitting any of these.
    pub stop: Vec<String>,
}

impl ModelRequest {
    /// A request holding a single user message.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ModelMessage::user(text)],
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stop(mut self, stop: &[&str]) -> Self {
        self.stop = stop.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Text of the last user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
    }
}

/// A hosted (or scripted) text generator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `request`.
    async fn generate(&self, request: &ModelRequest) -> Result<String, AgentError>;

    /// Identifier used in logs.
    fn model_id(&self) -> &str;
}

/// Model that replays scripted replies and records every request.
///
/// Clones share the script and the request log, so a test can keep a handle
/// after moving the model into an agent.
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Result<String, AgentError>>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, AgentError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A model that answers each call with the next string.
    pub fn answering(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: &ModelRequest) -> Result<String, AgentError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Err(AgentError::invalid_request("no scripted reply left")))
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_request() {
        let req = ModelRequest::prompt("hi")
            .with_system("be brief")
            .with_stop(&["\nObservation:"]);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert_eq!(req.stop, vec!["\nObservation:".to_string()]);
        assert_eq!(req.last_user_text(), Some("hi"));
    }

    #[test]
    fn test_last_user_text_skips_model_messages() {
        let req = ModelRequest {
            messages: vec![ModelMessage::user("q1"), ModelMessage::model("a1")],
            ..ModelRequest::default()
        };
        assert_eq!(req.last_user_text(), Some("q1"));
        assert_eq!(ModelRequest::default().last_user_text(), None);
    }

    #[tokio::test]
    async fn test_scripted_model_replays_and_records() {
        let model = ScriptedModel::answering(&["one", "two"]);
        let handle = model.clone();
        assert_eq!(model.generate(&ModelRequest::prompt("a")).await.unwrap(), "one");
        assert_eq!(model.generate(&ModelRequest::prompt("b")).await.unwrap(), "two");
        assert!(model.generate(&ModelRequest::prompt("c")).await.is_err());
        assert_eq!(handle.call_count(), 3);
        assert_eq!(handle.requests()[1].last_user_text(), Some("b"));
    }
}
