pub mod llm_worker;
pub mod summary_worker;
pub mod turn_worker;
pub use llm_worker::OpenAiCompatibleClient;
pub use summary_worker::{PassOutcome, RunningGuard, Summarizer, SummaryEvent};
pub use turn_worker::{TurnEvent, TurnWorker};
