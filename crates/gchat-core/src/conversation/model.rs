//! Conversation domain model.
//!
//! The same shape is used for the active conversation (`conversation.json`)
//! and for each dated history entry (`history/YYYY-MM-DD.json`).

use super::message::Message;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default retention ceiling for the active conversation.
pub const DEFAULT_HISTORY_MAX: usize = 50;

/// Last-used generation settings, carried onto history entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub model: String,
    pub temperature: f64,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(model: impl Into<String>, temperature: f64) -> Self {
        Self {
            model: model.into(),
            temperature,
            updated_at: Utc::now(),
        }
    }
}

/// An ordered log of turns associated with one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub contents: Vec<Message>,
    /// Calendar day this conversation belongs to
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Set when the active slot was populated from a history entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionRecord>,
}

impl Conversation {
    /// Creates an empty conversation for `date`.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            contents: Vec::new(),
            date,
            created_at: Utc::now(),
            loaded_from: None,
            archived_at: None,
            session: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Appends `message`, evicting the oldest messages first so the length
    /// never exceeds `ceiling`.
    pub fn push_bounded(&mut self, message: Message, ceiling: usize) {
        let ceiling = ceiling.max(1);
        if self.contents.len() >= ceiling {
            let overflow = self.contents.len() + 1 - ceiling;
            self.contents.drain(..overflow);
        }
        self.contents.push(message);
    }

    /// Drops the oldest messages until at most `ceiling` remain.
    pub fn trim_to(&mut self, ceiling: usize) -> usize {
        let ceiling = ceiling.max(1);
        if self.contents.len() <= ceiling {
            return 0;
        }
        let overflow = self.contents.len() - ceiling;
        self.contents.drain(..overflow);
        overflow
    }

    pub fn summary(&self, detailed: bool) -> HistorySummary {
        HistorySummary {
            date: self.date,
            message_count: self.contents.len(),
            created_at: detailed.then_some(self.created_at),
            archived_at: if detailed { self.archived_at } else { None },
            model: if detailed {
                self.session.as_ref().map(|s| s.model.clone())
            } else {
                None
            },
        }
    }
}

/// One row of a history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub date: NaiveDate,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
