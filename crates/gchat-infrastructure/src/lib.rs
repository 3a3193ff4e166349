//! Filesystem side of gchat: workspace paths, atomic JSON storage, the
//! date-partitioned conversation store, config files and MIME sniffing.

pub mod config_reader;
pub mod conversation_store;
pub mod mime;
pub mod paths;
pub mod storage;

pub use crate::config_reader::{LayeredConfig, MemoryConfig, TomlConfigReader};
pub use crate::conversation_store::{ConversationStore, parse_date};
pub use crate::paths::{GchatPaths, WorkspaceLayout};
