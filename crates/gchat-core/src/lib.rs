//! Core types for gchat: the conversation model, the error taxonomy and
//! the two collaborator contracts (configuration and notifications).

pub mod config;
pub mod conversation;
pub mod error;
pub mod notify;

pub use config::{ConfigReader, GenerationSettings, StoreSettings};
pub use conversation::{Conversation, HistorySummary, Message, Part, Role, SessionRecord};
pub use error::{GchatError, Result};
pub use notify::NotificationSink;
