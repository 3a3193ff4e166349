//! Network side of gchat: request assembly, the Gemini client, SSE
//! decoding and the chat-turn orchestration that ties them to the
//! conversation store.

pub mod chat_session;
pub mod gemini_client;
pub mod request_builder;
pub mod sse;
pub mod wire;

pub use chat_session::{ChatRequest, ChatSession};
pub use gemini_client::{ClientSettings, GeminiClient};
pub use request_builder::{BuiltRequest, PromptInput, RequestBuilder};
pub use sse::{SseStreamReader, StreamState};
