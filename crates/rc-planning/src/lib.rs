pub mod conversation;
pub mod history;
pub mod tools;

pub use conversation::{ConversationInput, ConversationStateManager, PreparedConversation};
pub use history::HistoryPlanner;
pub use tools::{BuildToolPayloadInput, FunctionToolDefinition, ToolRegistry};
