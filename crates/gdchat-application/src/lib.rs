//! Application layer: turns user input into conversation updates and remote
//! calls.

pub mod correction;
pub mod orchestrator;
pub mod outcome;

pub use orchestrator::{CONTINUE_INSTRUCTION, ChatOrchestrator, ChatOrchestratorBuilder};
pub use outcome::{Outcome, PendingAction};
