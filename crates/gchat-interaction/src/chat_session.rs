//! One chat turn, end to end.
//!
//! `ChatSession::run` archives a stale conversation, builds the request,
//! dispatches it (streaming or not), and records the exchange only after
//! the full answer has arrived.

use crate::gemini_client::GeminiClient;
use crate::request_builder::{PromptInput, RequestBuilder};
use gchat_core::{
    ConfigReader, GchatError, Message, NotificationSink, Result, SessionRecord, StoreSettings,
};
use gchat_infrastructure::ConversationStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Parameters of a single turn.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub prompt: String,
    pub attachments: Vec<PathBuf>,
    pub continue_conversation: bool,
    pub streaming: bool,
    pub schema_path: Option<PathBuf>,
    /// Skip the automatic stale-archive check (the caller already archived)
    pub skip_archive: bool,
}

impl ChatRequest {
    /// A streaming request for `prompt`.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            streaming: true,
            ..Self::default()
        }
    }

    fn prompt_input(&self) -> PromptInput {
        PromptInput {
            prompt: self.prompt.clone(),
            attachments: self.attachments.clone(),
            continue_conversation: self.continue_conversation,
            schema_path: self.schema_path.clone(),
        }
    }
}

/// Orchestrates request building, dispatch and recording.
pub struct ChatSession {
    store: Arc<ConversationStore>,
    config: Arc<dyn ConfigReader>,
    client: GeminiClient,
    notifier: Option<Arc<dyn NotificationSink>>,
}

impl ChatSession {
    pub fn new(
        store: Arc<ConversationStore>,
        config: Arc<dyn ConfigReader>,
        client: GeminiClient,
    ) -> Self {
        Self {
            store,
            config,
            client,
            notifier: None,
        }
    }

    /// Opens the store at `workspace` and the client, both from `config`.
    pub fn from_config(config: Arc<dyn ConfigReader>, workspace: &Path) -> Result<Self> {
        let client = GeminiClient::from_config(config.as_ref())?;
        let settings = StoreSettings::from_config(config.as_ref())?;
        let store = ConversationStore::open(workspace, settings)?;
        Ok(Self::new(Arc::new(store), config, client))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Runs one turn and returns the full answer text.
    ///
    /// `on_fragment` sees each piece of text as it arrives (once, with the
    /// whole answer, when not streaming). Nothing is written to the
    /// conversation log unless the answer is complete; a cancelled or
    /// failed turn leaves the log untouched.
    pub async fn run<F>(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        mut on_fragment: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        if !request.skip_archive {
            let archived = self.blocking(|store| store.archive_if_stale()).await?;
            if archived {
                tracing::info!("archived previous day's conversation");
            }
        }

        let built = RequestBuilder::new(self.config.as_ref())
            .with_store(&self.store)
            .build(&request.prompt_input())?;
        for path in &built.skipped_attachments {
            tracing::warn!(path = %path.display(), "attachment was not sent");
        }

        let model = built.settings.model.clone();
        tracing::info!(%model, streaming = request.streaming, "dispatching chat turn");

        let answer = if request.streaming {
            self.dispatch_streaming(&model, &built.payload, cancel, &mut on_fragment)
                .await?
        } else {
            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GchatError::Cancelled),
                result = self.client.generate(&model, &built.payload) => result?,
            };
            on_fragment(&answer);
            answer
        };

        if answer.is_empty() {
            return Err(GchatError::api(None, "model finished without returning any text"));
        }

        let user_turn = built.user_turn;
        let model_turn = Message::model(answer.clone());
        let session = SessionRecord::new(model, built.settings.temperature);
        self.blocking(move |store| store.append_exchange(user_turn, model_turn, Some(session)))
            .await?;
        tracing::debug!(chars = answer.chars().count(), "recorded exchange");

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&answer).await {
                tracing::warn!(error = %e, "notification failed");
            }
        }

        Ok(answer)
    }

    async fn dispatch_streaming<F>(
        &self,
        model: &str,
        payload: &crate::wire::GenerateContentRequest,
        cancel: &CancellationToken,
        on_fragment: &mut F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let mut reader = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GchatError::Cancelled),
            result = self.client.stream_generate(model, payload) => result?,
        };

        let mut answer = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(discarded_chars = answer.len(), "stream cancelled");
                    return Err(GchatError::Cancelled);
                }
                next = reader.next_fragment() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    on_fragment(&fragment);
                    answer.push_str(&fragment);
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        if reader.skipped_chunks() > 0 {
            tracing::warn!(skipped = reader.skipped_chunks(), "ignored malformed stream chunks");
        }
        Ok(answer)
    }

    /// Runs a store operation off the async executor.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&ConversationStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| GchatError::io(format!("conversation store task failed: {e}")))?
    }
}
