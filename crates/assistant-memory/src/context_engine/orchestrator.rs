use std::sync::Arc;

use tracing::{error, info};

use crate::context_engine::{
    context_builder::{ContextAssembler, ContextBundle},
    ModelClient, PersonalitySource, ProfileSource,
};
use crate::error::Result;
use crate::memory::ChatSession;
use crate::memory_db::MemoryDatabase;

/// What a successful turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub bundle: ContextBundle,
}

/// One user turn: retrieve, log the user message, call the model, log the
/// reply. Cheap to share; each run checks out its own connection.
pub struct ChatTurn {
    database: Arc<MemoryDatabase>,
    assembler: ContextAssembler,
    profile: Arc<dyn ProfileSource>,
    personality: Arc<dyn PersonalitySource>,
    model: Arc<dyn ModelClient>,
}

impl ChatTurn {
    pub fn new(
        database: Arc<MemoryDatabase>,
        assembler: ContextAssembler,
        profile: Arc<dyn ProfileSource>,
        personality: Arc<dyn PersonalitySource>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            database,
            assembler,
            profile,
            personality,
            model,
        }
    }

    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.database
    }

    /// Builds the bundle for `user_message` without calling the model or
    /// writing anything.
    pub async fn preview(&self, user_message: &str) -> Result<ContextBundle> {
        let mut store = self.database.scoped().await?;
        self.assembler
            .build_context(user_message, &mut store, self.profile.as_ref(), self.personality.as_ref())
            .await
    }

    /// A new session whose system prompt carries the latest summary.
    pub async fn new_session(&self, system_prompt: &str) -> Result<ChatSession> {
        let store = self.database.scoped().await?;
        let prompt = match self.assembler.session_primer(&store)? {
            Some(primer) => format!("{}\n\n{}", system_prompt, primer),
            None => system_prompt.to_string(),
        };
        Ok(ChatSession::with_system_prompt(prompt))
    }

    /// Search runs before the user message is stored, so it never matches
    /// itself. The user message is stored before the model call and survives
    /// a model failure. No connection is held while the model runs. If the
    /// reply cannot be stored the session is rolled back to where it was, so
    /// history and log agree.
    pub async fn run(&self, session: &mut ChatSession, user_message: &str) -> Result<TurnOutcome> {
        let bundle = {
            let mut store = self.database.scoped().await?;
            let bundle = self
                .assembler
                .build_context(user_message, &mut store, self.profile.as_ref(), self.personality.as_ref())
                .await?;
            store.add_message(user_message).await?;
            bundle
        };

        let history_len = session.history().len();
        let response = match self.model.send_message(session, &bundle.render()).await {
            Ok(response) => response,
            Err(e) => {
                error!("Model call failed for session {}: {}", session.id(), e);
                return Err(e);
            }
        };

        if let Err(e) = self.store_reply(&response).await {
            error!("Reply for session {} not stored, rolling back history: {}", session.id(), e);
            session.truncate_history(history_len);
            return Err(e);
        }
        info!("Turn complete for session {} ({} chars reply)", session.id(), response.len());

        Ok(TurnOutcome { response, bundle })
    }

    async fn store_reply(&self, response: &str) -> Result<()> {
        let mut store = self.database.scoped().await?;
        store.add_message(response).await?;
        Ok(())
    }
}
