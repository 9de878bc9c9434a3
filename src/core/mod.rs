//! 核心编排层：错误、阶段、对话编排器、组件装配

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use builder::{create_harness, Harness, HarnessBuilder};
pub use error::{BackendError, HarnessError};
pub use orchestrator::{ApprovalContext, ConversationOrchestrator, PendingChanges, PendingChangesLocation};
pub use state::OrchestratorPhase;
