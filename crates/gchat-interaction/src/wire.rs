//! Gemini `generateContent` wire types.

use gchat_core::{Message, Part};
use serde::{Deserialize, Serialize};

/// Body of both `generateContent` and `streamGenerateContent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl From<&Message> for Content {
    fn from(message: &Message) -> Self {
        Content {
            role: Some(message.role.as_str().to_string()),
            parts: message.parts.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

/// A full response, or one SSE chunk of a streamed response.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<ContentResponse>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentResponse {
    pub parts: Option<Vec<PartResponse>>,
}

#[derive(Debug, Deserialize)]
pub struct PartResponse {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorWrapper {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub status: Option<String>,
}

impl ErrorBody {
    /// `STATUS: message`, or whichever half is present.
    pub fn describe(&self) -> String {
        let status = self.status.as_deref().unwrap_or_default();
        let message = self.message.as_deref().unwrap_or("unknown error");
        if status.is_empty() {
            message.to_string()
        } else {
            format!("{status}: {message}")
        }
    }
}

impl GenerateContentResponse {
    fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.as_ref()?.first()
    }

    /// `candidates[0].content.parts[0].text`
    pub fn first_text(&self) -> Option<&str> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .first()?
            .text
            .as_deref()
    }

    /// `candidates[0].finishReason`, ignoring absent and empty values.
    pub fn finish_reason(&self) -> Option<&str> {
        self.first_candidate()?
            .finish_reason
            .as_deref()
            .filter(|reason| !reason.is_empty())
    }
}
