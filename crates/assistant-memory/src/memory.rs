use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Chat history owned by one conversation. Sessions are passed explicitly to
/// the model client, so any number can coexist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    id: String,
    system_prompt: Option<String>,
    history: Vec<Message>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            system_prompt: None,
            history: Vec::new(),
        }
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.system_prompt = Some(prompt.into());
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(Message::assistant(content));
    }

    /// System prompt (if any) followed by the history, ready for a request.
    pub fn request_messages(&self) -> Vec<Message> {
        self.system_prompt
            .iter()
            .map(|p| Message::system(p.clone()))
            .chain(self.history.iter().cloned())
            .collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Drops everything after the first `len` history entries.
    pub fn truncate_history(&mut self, len: usize) {
        self.history.truncate(len);
    }
}
