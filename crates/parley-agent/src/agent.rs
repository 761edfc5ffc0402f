//! The reasoning agent: model + tools + memory behind one `run` call.

use std::time::Duration;

use async_trait::async_trait;
use parley_core::config::{AgentConfig, ModelConfig};
use parley_core::ReasoningStrategy;

use crate::error::AgentError;
use crate::llm::{LanguageModel, ModelMessage, ModelRequest};
use crate::memory::ConversationMemory;
use crate::react::{self, ReactStep, OBSERVATION_STOP};
use crate::tools::ToolRegistry;

/// Reply given when the tool loop runs out of iterations.
pub const ITERATION_LIMIT_REPLY: &str = "Agent stopped due to iteration limit.";

const DIRECT_SYSTEM: &str = "You are a helpful, friendly assistant. Answer the user's \
messages conversationally and concisely.";

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Anything that turns a user message into a reply while keeping its own
/// conversation memory.
#[async_trait]
pub trait Reasoner: Send {
    /// Produce a reply to `input`. Successful exchanges are remembered.
    async fn run(&mut self, input: &str) -> Result<String, AgentError>;

    /// Forget all prior exchanges.
    fn reset(&mut self);
}

/// How often and how patiently to retry failed model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based). A server-provided
    /// hint wins over the exponential schedule.
    pub fn delay_for(&self, attempt: u32, error: &AgentError) -> Duration {
        if let Some(hint) = error.retry_after {
            return hint.min(MAX_BACKOFF);
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_BACKOFF)
    }
}

/// Conversational agent with tools and memory.
pub struct Agent {
    model: Box<dyn LanguageModel>,
    tools: ToolRegistry,
    memory: ConversationMemory,
    strategy: ReasoningStrategy,
    max_iterations: usize,
    retry: RetryPolicy,
}

impl Agent {
    pub fn new(model: impl LanguageModel + 'static, tools: ToolRegistry) -> Self {
        Self {
            model: Box::new(model),
            tools,
            memory: ConversationMemory::new(),
            strategy: ReasoningStrategy::default(),
            max_iterations: 5,
            retry: RetryPolicy::default(),
        }
    }

    /// Build an agent with strategy, iteration and retry settings from config.
    pub fn from_config(
        model: impl LanguageModel + 'static,
        tools: ToolRegistry,
        agent: &AgentConfig,
        model_config: &ModelConfig,
    ) -> Self {
        Self::new(model, tools)
            .with_strategy(agent.strategy)
            .with_max_iterations(agent.max_iterations)
            .with_retry(RetryPolicy::from_config(model_config))
    }

    pub fn with_strategy(mut self, strategy: ReasoningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn strategy(&self) -> ReasoningStrategy {
        self.strategy
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    async fn call_model(&self, request: &ModelRequest) -> Result<String, AgentError> {
        let mut attempt = 0;
        loop {
            match self.model.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt, &e);
                    tracing::warn!(
                        model = %self.model.model_id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Model call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_react(&self, input: &str) -> Result<String, AgentError> {
        let history = self.memory.render();
        let mut scratchpad = String::new();

        for iteration in 0..self.max_iterations {
            let prompt = react::build_prompt(&self.tools, &history, input, &scratchpad);
            let request = ModelRequest::prompt(prompt).with_stop(&[OBSERVATION_STOP]);
            let output = self.call_model(&request).await?;

            match react::parse_output(&output)? {
                ReactStep::Answer(answer) => return Ok(answer),
                ReactStep::Action { tool, input: query } => {
                    let observation = match self.tools.get(&tool) {
                        Some(t) => t.invoke(&query).await,
                        None => react::unknown_tool_observation(&tool, &self.tools),
                    };
                    tracing::debug!(iteration, %tool, %query, "Tool observation: {}", observation);
                    scratchpad.push_str(&react::scratch_entry(&output, &observation));
                }
            }
        }

        tracing::warn!(max_iterations = self.max_iterations, "Agent hit iteration limit");
        Ok(ITERATION_LIMIT_REPLY.to_string())
    }

    async fn run_direct(&self, input: &str) -> Result<String, AgentError> {
        let mut messages = self.memory.to_messages();
        messages.push(ModelMessage::user(input));
        let request = ModelRequest {
            messages,
            ..ModelRequest::default()
        }
        .with_system(DIRECT_SYSTEM);

        let text = self.call_model(&request).await?;
        let reply = text.trim();
        if reply.is_empty() {
            return Err(AgentError::malformed("Model returned an empty reply"));
        }
        Ok(reply.to_string())
    }
}

#[async_trait]
impl Reasoner for Agent {
    async fn run(&mut self, input: &str) -> Result<String, AgentError> {
        let reply = match self.strategy {
            ReasoningStrategy::ConversationalReact => self.run_react(input).await?,
            ReasoningStrategy::Direct => self.run_direct(input).await?,
        };
        self.memory.record(input, reply.clone());
        tracing::debug!(exchanges = self.memory.len(), "Agent replied");
        Ok(reply)
    }

    fn reset(&mut self) {
        self.memory.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentErrorKind;
    use crate::llm::{Role, ScriptedModel};

    fn agent(model: &ScriptedModel) -> Agent {
        Agent::new(model.clone(), ToolRegistry::with_defaults()).with_retry(RetryPolicy::none())
    }

    fn prompt_of(model: &ScriptedModel, call: usize) -> String {
        model.requests()[call].last_user_text().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_react_direct_answer() {
        let model = ScriptedModel::answering(&["Thought: Do I need to use a tool? No\nAI: Hi there!"]);
        let mut agent = agent(&model);

        assert_eq!(agent.run("hello").await.unwrap(), "Hi there!");
        assert_eq!(agent.memory().len(), 1);
        assert_eq!(model.requests()[0].stop, vec![OBSERVATION_STOP.to_string()]);
    }

    #[tokio::test]
    async fn test_react_uses_tool() {
        let model = ScriptedModel::answering(&[
            "Thought: Do I need to use a tool? Yes\nAction: Search\nAction Input: rust news",
            "Thought: Do I need to use a tool? No\nAI: Here is what I found.",
        ]);
        let mut agent = agent(&model);

        assert_eq!(agent.run("any rust news?").await.unwrap(), "Here is what I found.");
        assert_eq!(model.call_count(), 2);
        let second = prompt_of(&model, 1);
        assert!(second.contains("Action Input: rust news\nObservation: Search results for: rust news\nThought: "));
    }

    #[tokio::test]
    async fn test_react_unknown_tool() {
        let model = ScriptedModel::answering(&[
            "Thought: Yes\nAction: Calculator\nAction Input: 2+2",
            "AI: It is 4.",
        ]);
        let mut agent = agent(&model);

        assert_eq!(agent.run("what is 2+2").await.unwrap(), "It is 4.");
        assert!(prompt_of(&model, 1)
            .contains("Observation: Calculator is not a valid tool, try one of [Search]."));
    }

    #[tokio::test]
    async fn test_react_iteration_limit() {
        let step = "Thought: Yes\nAction: Search\nAction Input: again";
        let model = ScriptedModel::answering(&[step, step, step]);
        let mut agent = agent(&model).with_max_iterations(2);

        assert_eq!(agent.run("loop").await.unwrap(), ITERATION_LIMIT_REPLY);
        assert_eq!(model.call_count(), 2);
        assert_eq!(agent.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_react_malformed_not_remembered() {
        let model = ScriptedModel::answering(&["Thought: I should search\nAction: Search"]);
        let mut agent = agent(&model);

        let err = agent.run("hmm").await.unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::MalformedResponse);
        assert!(agent.memory().is_empty());
    }

    #[tokio::test]
    async fn test_react_plain_reply() {
        let model = ScriptedModel::answering(&["Sure, happy to help."]);
        let mut agent = agent(&model);
        assert_eq!(agent.run("help me").await.unwrap(), "Sure, happy to help.");
    }

    #[tokio::test]
    async fn test_memory_in_next_prompt() {
        let model = ScriptedModel::answering(&["AI: Hi there!", "AI: You said hello."]);
        let mut agent = agent(&model);

        agent.run("hello").await.unwrap();
        agent.run("what did I say?").await.unwrap();
        let second = prompt_of(&model, 1);
        assert!(second.contains("Human: hello\nAI: Hi there!"));
        assert!(second.contains("New input: what did I say?"));
    }

    #[tokio::test]
    async fn test_reset_clears_memory() {
        let model = ScriptedModel::answering(&["AI: one", "AI: two"]);
        let mut agent = agent(&model);

        agent.run("first").await.unwrap();
        agent.reset();
        assert!(agent.memory().is_empty());
        agent.run("second").await.unwrap();
        assert!(!prompt_of(&model, 1).contains("Human: first"));
    }

    #[tokio::test]
    async fn test_direct_strategy() {
        let model = ScriptedModel::answering(&["  Hello!  ", "Again."]);
        let mut agent = agent(&model).with_strategy(ReasoningStrategy::Direct);

        assert_eq!(agent.run("hi").await.unwrap(), "Hello!");
        agent.run("hi again").await.unwrap();

        let request = &model.requests()[1];
        assert_eq!(request.system.as_deref(), Some(DIRECT_SYSTEM));
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User]);
        assert_eq!(request.messages[1].text, "Hello!");
        assert!(request.stop.is_empty());
    }

    #[tokio::test]
    async fn test_direct_empty_reply_is_error() {
        let model = ScriptedModel::answering(&["   "]);
        let mut agent = agent(&model).with_strategy(ReasoningStrategy::Direct);
        let err = agent.run("hi").await.unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let model = ScriptedModel::new(vec![
            Err(AgentError::network("connection reset")),
            Ok("AI: recovered".into()),
        ]);
        let mut agent = agent(&model).with_retry(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::ZERO,
        });

        assert_eq!(agent.run("hi").await.unwrap(), "recovered");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let model = ScriptedModel::new(vec![
            Err(AgentError::server("boom")),
            Err(AgentError::server("boom")),
            Err(AgentError::server("boom")),
            Ok("AI: too late".into()),
        ]);
        let mut agent = agent(&model).with_retry(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::ZERO,
        });

        let err = agent.run("hi").await.unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::Server);
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let model = ScriptedModel::new(vec![
            Err(AgentError::auth("bad key")),
            Ok("AI: unreachable".into()),
        ]);
        let mut agent = agent(&model).with_retry(RetryPolicy::default());

        let err = agent.run("hi").await.unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::Auth);
        assert_eq!(err.to_string(), "bad key");
        assert_eq!(model.call_count(), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        let err = AgentError::network("x");
        assert_eq!(policy.delay_for(0, &err), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1, &err), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2, &err), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(20, &err), MAX_BACKOFF);

        let hinted = AgentError::rate_limit("x").with_retry_after(Duration::from_secs(4));
        assert_eq!(policy.delay_for(0, &hinted), Duration::from_secs(4));
    }

    #[test]
    fn test_from_config() {
        let mut agent_cfg = AgentConfig::default();
        agent_cfg.strategy = ReasoningStrategy::Direct;
        agent_cfg.max_iterations = 0;
        let model_cfg = ModelConfig::default();

        let agent = Agent::from_config(
            ScriptedModel::default(),
            ToolRegistry::with_defaults(),
            &agent_cfg,
            &model_cfg,
        );
        assert_eq!(agent.strategy(), ReasoningStrategy::Direct);
        assert_eq!(agent.max_iterations, 1);
        assert_eq!(agent.retry, RetryPolicy::default());
        assert_eq!(agent.tools().names(), vec!["Search"]);
    }
}
