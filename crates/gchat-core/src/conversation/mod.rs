//! Conversation log domain: messages, dated conversations, listings.

pub mod message;
pub mod model;

pub use message::{InlineData, Message, Part, Role};
pub use model::{Conversation, DEFAULT_HISTORY_MAX, HistorySummary, SessionRecord};
