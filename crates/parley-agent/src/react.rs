//! Prompt layout and output parsing for the conversational ReAct loop.
//!
//! The model is asked to think in `Thought:` / `Action:` / `Action Input:`
//! steps and to finish with an `AI:` line addressed to the human.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::AgentError;
use crate::tools::ToolRegistry;

/// Generation stops here so the model never invents its own observations.
pub const OBSERVATION_STOP: &str = "\nObservation:";

const AI_PREFIX: &str = "AI:";

const PREAMBLE: &str = "Assistant is a large language model trained to help with a wide range \
of tasks, from answering simple questions to explaining topics in depth. Assistant holds a \
natural conversation, keeps its answers relevant, and can use tools when they help.";

/// What the model decided to do on one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactStep {
    /// Final reply for the human.
    Answer(String),
    /// Call `tool` with `input`, then think again.
    Action { tool: String, input: String },
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*:\s*(.*?)\n+\s*Action\s*Input\s*:\s*(.*)")
            .expect("Invalid action regex")
    })
}

/// Classify one model completion.
pub fn parse_output(text: &str) -> Result<ReactStep, AgentError> {
    // Anything after a hallucinated observation is not the model's decision.
    let text = match text.find(OBSERVATION_STOP) {
        Some(idx) => &text[..idx],
        None => text,
    };

    if let Some(idx) = text.rfind(AI_PREFIX) {
        let answer = text[idx + AI_PREFIX.len()..].trim();
        return Ok(ReactStep::Answer(answer.to_string()));
    }

    if let Some(caps) = action_regex().captures(text) {
        let tool = caps[1].trim().to_string();
        let input = caps[2].trim().trim_matches('"').trim().to_string();
        return Ok(ReactStep::Action { tool, input });
    }

    if !has_markers(text) && !text.trim().is_empty() {
        return Ok(ReactStep::Answer(text.trim().to_string()));
    }

    Err(AgentError::malformed(format!(
        "Could not parse LLM output: `{}`",
        text.trim()
    )))
}

fn has_markers(text: &str) -> bool {
    ["Thought:", "Action:", "Action Input:"]
        .iter()
        .any(|m| text.contains(m))
}

/// Build the full prompt for one step of the loop.
pub fn build_prompt(tools: &ToolRegistry, history: &str, input: &str, scratchpad: &str) -> String {
    let names = tools.names().join(", ");
    format!(
        "{PREAMBLE}\n\n\
TOOLS:\n\
------\n\n\
Assistant has access to the following tools:\n\n\
{tools}\n\n\
To use a tool, use exactly this format:\n\n\
```\n\
Thought: Do I need to use a tool? Yes\n\
Action: the action to take, should be one of [{names}]\n\
Action Input: the input to the action\n\
Observation: the result of the action\n\
```\n\n\
When you have a response for the Human, or do not need a tool, you MUST use the format:\n\n\
```\n\
Thought: Do I need to use a tool? No\n\
AI: [your response here]\n\
```\n\n\
Begin!\n\n\
Previous conversation history:\n\
{history}\n\n\
New input: {input}\n\
{scratchpad}",
        tools = tools.describe(),
    )
}

/// Scratchpad entry recording a completed tool call.
pub fn scratch_entry(model_output: &str, observation: &str) -> String {
    let output = match model_output.find(OBSERVATION_STOP) {
        Some(idx) => &model_output[..idx],
        None => model_output,
    };
    format!("{}\nObservation: {}\nThought: ", output.trim_end(), observation)
}

/// Observation returned when the model names a tool that does not exist.
pub fn unknown_tool_observation(tool: &str, tools: &ToolRegistry) -> String {
    format!(
        "{} is not a valid tool, try one of [{}].",
        tool,
        tools.names().join(", ")
    )
}
