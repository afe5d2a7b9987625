//! Context engine module - assembles per-turn context and drives chat turns

pub mod collaborators;
pub mod context_builder;
pub mod orchestrator;

pub use collaborators::{ModelClient, PersonalitySource, ProfileSource};
pub use context_builder::{ContextAssembler, ContextBundle};
pub use orchestrator::{ChatTurn, TurnOutcome};
