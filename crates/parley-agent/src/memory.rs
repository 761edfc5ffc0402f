//! Conversation memory handed to the model on every call.

use crate::llm::ModelMessage;

/// One completed input/output pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub input: String,
    pub output: String,
}

/// Append-only log of completed exchanges, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    exchanges: Vec<Exchange>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.exchanges.push(Exchange {
            input: input.into(),
            output: output.into(),
        });
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// History as alternating user/model chat messages.
    pub fn to_messages(&self) -> Vec<ModelMessage> {
        self.exchanges
            .iter()
            .flat_map(|e| [ModelMessage::user(&e.input), ModelMessage::model(&e.output)])
            .collect()
    }

    /// History as a `Human:` / `AI:` transcript for text prompts.
    pub fn render(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("Human: {}\nAI: {}", e.input, e.output))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_record_and_order() {
        let mut memory = ConversationMemory::new();
        memory.record("hello", "hi");
        memory.record("how are you", "fine");
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.exchanges()[0].input, "hello");
        assert_eq!(memory.exchanges()[1].output, "fine");
    }

    #[test]
    fn test_to_messages_alternates_roles() {
        let mut memory = ConversationMemory::new();
        memory.record("q", "a");
        let msgs = memory.to_messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[1].role, Role::Model);
        assert_eq!(msgs[1].text, "a");
    }

    #[test]
    fn test_render() {
        let mut memory = ConversationMemory::new();
        assert_eq!(memory.render(), "");
        memory.record("hello", "hi there");
        memory.record("bye", "see you");
        assert_eq!(memory.render(), "Human: hello\nAI: hi there\nHuman: bye\nAI: see you");
    }

    #[test]
    fn test_clear() {
        let mut memory = ConversationMemory::new();
        memory.record("a", "b");
        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.to_messages().is_empty());
    }
}
