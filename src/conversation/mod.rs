mod history;
mod orchestrator;

pub use history::{ConversationHistory, ConversationTurn, Speaker};
pub use orchestrator::ConversationOrchestrator;
