//! Request payload assembly.

use crate::wire::{Content, GenerateContentRequest, GenerationConfig};
use gchat_core::{ConfigReader, GchatError, GenerationSettings, Message, Part, Result, Role};
use gchat_infrastructure::ConversationStore;
use gchat_infrastructure::mime::{detect_mime, encode_base64};
use std::path::{Path, PathBuf};

/// What the user asked for in one turn.
#[derive(Debug, Clone, Default)]
pub struct PromptInput {
    pub prompt: String,
    pub attachments: Vec<PathBuf>,
    /// Fold the active conversation in front of the new turn
    pub continue_conversation: bool,
    /// JSON Schema file constraining the response
    pub schema_path: Option<PathBuf>,
}

impl PromptInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// A ready-to-send payload plus what the session needs afterwards.
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub payload: GenerateContentRequest,
    /// The new user turn, recorded once the model has answered
    pub user_turn: Message,
    pub settings: GenerationSettings,
    pub skipped_attachments: Vec<PathBuf>,
}

/// Builds `generateContent` payloads from config, prompt and history.
pub struct RequestBuilder<'a> {
    config: &'a dyn ConfigReader,
    store: Option<&'a ConversationStore>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a dyn ConfigReader) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// Supplies the store consulted when continuing a conversation.
    pub fn with_store(mut self, store: &'a ConversationStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(&self, input: &PromptInput) -> Result<BuiltRequest> {
        let settings = GenerationSettings::from_config(self.config)?;

        let mut attachment_parts = Vec::with_capacity(input.attachments.len());
        let mut skipped_attachments = Vec::new();
        for path in &input.attachments {
            match attachment_part(path)? {
                Some(part) => attachment_parts.push(part),
                None => skipped_attachments.push(path.clone()),
            }
        }

        if input.prompt.trim().is_empty() && attachment_parts.is_empty() {
            return Err(GchatError::build("nothing to send: prompt and attachments are empty"));
        }

        let (response_mime_type, response_schema) = match &input.schema_path {
            Some(path) => (Some("application/json".to_string()), Some(load_schema(path)?)),
            None => (None, None),
        };

        let mut contents = Vec::new();
        if input.continue_conversation {
            let store = self.store.ok_or_else(|| {
                GchatError::build("continuing a conversation requires a conversation store")
            })?;
            let active = store.active()?;
            tracing::debug!(prior_turns = active.len(), "continuing active conversation");
            contents.extend(active.contents.iter().map(Content::from));
        }

        let user_turn = Message::new(Role::User, input.prompt.clone(), attachment_parts);
        contents.push(Content::from(&user_turn));

        let system_instruction = settings.system_prompt.as_ref().map(|text| Content {
            role: None,
            parts: vec![Part::text(text.clone())],
        });

        let payload = GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: settings.temperature,
                max_output_tokens: settings.max_tokens,
                top_p: settings.top_p,
                top_k: settings.top_k,
                response_mime_type,
                response_schema,
            },
        };

        Ok(BuiltRequest {
            payload,
            user_turn,
            settings,
            skipped_attachments,
        })
    }
}

/// Encodes one attachment; a path that does not exist is skipped.
fn attachment_part(path: &Path) -> Result<Option<Part>> {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "attachment not found, skipping");
        return Ok(None);
    }
    let mime_type = detect_mime(path);
    let data = encode_base64(path)?;
    tracing::debug!(path = %path.display(), %mime_type, bytes = data.len(), "attached file");
    Ok(Some(Part::inline_data(mime_type, data)))
}

fn load_schema(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        GchatError::build(format!("cannot read schema {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        GchatError::build(format!("schema {} is not valid JSON: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gchat_core::StoreSettings;
    use gchat_core::config::keys;
    use gchat_infrastructure::MemoryConfig;
    use tempfile::TempDir;

    fn config() -> MemoryConfig {
        MemoryConfig::new()
            .with(keys::TEMPERATURE, "0.25")
            .with(keys::MAX_TOKENS, "1024")
    }

    #[test]
    fn test_fresh_single_turn() {
        let config = config();
        let built = RequestBuilder::new(&config)
            .build(&PromptInput::new("What is Rust?"))
            .unwrap();

        let value = serde_json::to_value(&built.payload).unwrap();
        assert_eq!(value["contents"].as_array().unwrap().len(), 1);
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "What is Rust?");
        assert_eq!(value["generationConfig"]["temperature"], 0.25);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(value["generationConfig"]["topP"], 0.9);
        assert_eq!(built.settings.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_attachments_are_inlined_and_missing_ones_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let image = temp_dir.path().join("pixel.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        let missing = temp_dir.path().join("missing.pdf");

        let config = config();
        let input = PromptInput {
            attachments: vec![image, missing.clone()],
            ..PromptInput::new("describe")
        };
        let built = RequestBuilder::new(&config).build(&input).unwrap();

        let parts = &built.payload.contents[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], Part::inline_data("image/png", "iVBORw=="));
        assert_eq!(built.skipped_attachments, vec![missing]);
        assert_eq!(built.user_turn.attachment_count(), 1);
    }

    #[test]
    fn test_continuation_prepends_active_conversation() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConversationStore::open(temp_dir.path(), StoreSettings::default()).unwrap();
        store.append(Role::User, "first question", Vec::new()).unwrap();
        store.append(Role::Model, "first answer", Vec::new()).unwrap();

        let config = config();
        let input = PromptInput {
            continue_conversation: true,
            ..PromptInput::new("second question")
        };
        let built = RequestBuilder::new(&config)
            .with_store(&store)
            .build(&input)
            .unwrap();

        let roles: Vec<_> = built
            .payload
            .contents
            .iter()
            .map(|c| c.role.clone().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(
            built.payload.contents[2].parts[0].as_text(),
            Some("second question")
        );
    }

    #[test]
    fn test_continuation_without_store_is_build_error() {
        let config = config();
        let input = PromptInput {
            continue_conversation: true,
            ..PromptInput::new("hi")
        };
        let err = RequestBuilder::new(&config).build(&input).unwrap_err();
        assert!(matches!(err, GchatError::Build(_)));
    }

    #[test]
    fn test_schema_sets_json_response() {
        let temp_dir = TempDir::new().unwrap();
        let schema = temp_dir.path().join("schema.json");
        std::fs::write(
            &schema,
            r#"{"type":"object","properties":{"answer":{"type":"string"}}}"#,
        )
        .unwrap();

        let config = config();
        let input = PromptInput {
            schema_path: Some(schema),
            ..PromptInput::new("answer as json")
        };
        let built = RequestBuilder::new(&config).build(&input).unwrap();

        let generation = &built.payload.generation_config;
        assert_eq!(generation.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(generation.response_schema.as_ref().unwrap()["type"], "object");
    }

    #[test]
    fn test_bad_schema_is_build_error() {
        let temp_dir = TempDir::new().unwrap();
        let schema = temp_dir.path().join("schema.json");
        std::fs::write(&schema, "{not json").unwrap();
        let config = config();

        for path in [schema, temp_dir.path().join("absent.json")] {
            let input = PromptInput {
                schema_path: Some(path),
                ..PromptInput::new("x")
            };
            let err = RequestBuilder::new(&config).build(&input).unwrap_err();
            assert!(matches!(err, GchatError::Build(_)));
        }
    }

    #[test]
    fn test_unparseable_setting_fails() {
        let config = MemoryConfig::new().with(keys::TOP_K, "forty");
        let err = RequestBuilder::new(&config)
            .build(&PromptInput::new("x"))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_system_prompt_becomes_instruction() {
        let config = config().with(keys::SYSTEM_PROMPT, "Answer tersely.");
        let built = RequestBuilder::new(&config)
            .build(&PromptInput::new("x"))
            .unwrap();
        let instruction = built.payload.system_instruction.unwrap();
        assert_eq!(instruction.parts[0].as_text(), Some("Answer tersely."));
        assert!(instruction.role.is_none());
    }

    #[test]
    fn test_empty_prompt_without_attachments_is_rejected() {
        let config = config();
        let err = RequestBuilder::new(&config)
            .build(&PromptInput::new("   "))
            .unwrap_err();
        assert!(matches!(err, GchatError::Build(_)));
    }
}
