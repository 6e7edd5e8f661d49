//! Conversation history stores for llmcode.

mod conversation;

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileHistory;
pub use in_memory::InMemoryHistory;
pub use conversation::ConversationLog;
