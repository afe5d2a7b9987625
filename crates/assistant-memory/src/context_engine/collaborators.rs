//! Capabilities the context engine consumes but does not own
use async_trait::async_trait;

use crate::error::Result;
use crate::memory::ChatSession;

/// Read side of the user profile.
pub trait ProfileSource: Send + Sync {
    fn get_preference(&self, key: &str, default: &str) -> String;

    /// Highest-scored topics first, at most `n`.
    fn get_top_topics(&self, n: usize) -> Vec<(String, f64)>;

    /// All preferences, in key order.
    fn preferences(&self) -> Vec<(String, String)>;

    /// Labelled identity lines (name, alias, bio, values...). Only fields that
    /// are set appear.
    fn identity(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

pub trait PersonalitySource: Send + Sync {
    fn get_personality_prompt(&self) -> String;
}

/// The hosted or local chat model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends `text` as the next user turn of `session` and returns the reply.
    /// On success both turns are appended to the session history; on failure
    /// the history is left untouched.
    async fn send_message(&self, session: &mut ChatSession, text: &str) -> Result<String>;
}
