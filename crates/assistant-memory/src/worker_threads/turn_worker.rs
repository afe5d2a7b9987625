//! Turn worker implementation
//!
//! Runs each chat turn as its own task and hands the result back through a
//! completion channel, so the caller's dispatch loop never waits on the
//! network or the disk.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::context_engine::{ChatTurn, TurnOutcome};
use crate::memory::ChatSession;

/// Delivered once per turn. The session travels back with the result.
#[derive(Debug)]
pub enum TurnEvent {
    Completed { session: ChatSession, outcome: TurnOutcome },
    Failed { session: ChatSession, error: String },
}

pub struct TurnWorker {
    turn: Arc<ChatTurn>,
}

impl TurnWorker {
    pub fn new(turn: Arc<ChatTurn>) -> Self {
        Self { turn }
    }

    pub fn spawn_turn(&self, mut session: ChatSession, user_message: String) -> oneshot::Receiver<TurnEvent> {
        let (tx, rx) = oneshot::channel();
        let turn = Arc::clone(&self.turn);
        tokio::spawn(async move {
            debug!("Turn started for session {}", session.id());
            let event = match turn.run(&mut session, &user_message).await {
                Ok(outcome) => TurnEvent::Completed { session, outcome },
                Err(e) => TurnEvent::Failed {
                    session,
                    error: e.to_string(),
                },
            };
            if tx.send(event).is_err() {
                warn!("Turn finished but nobody is waiting for it");
            }
        });
        rx
    }
}
