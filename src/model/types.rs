//! Classified sentence entities and query shapes.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Lifecycle state of a classified sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifiedSentenceStatus {
    /// Newly ingested, waiting for curation.
    #[default]
    Inbox,
    /// Approved by a curator.
    Validated,
    /// Used to build the current model.
    Model,
    /// Rejected by a curator.
    Deleted,
}

impl ClassifiedSentenceStatus {
    pub const ALL: [Self; 4] = [Self::Inbox, Self::Validated, Self::Model, Self::Deleted];

    /// Tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Validated => "validated",
            Self::Model => "model",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inbox" => Some(Self::Inbox),
            "validated" => Some(Self::Validated),
            "model" => Some(Self::Model),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClassifiedSentenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown sentence status '{0}' (expected inbox, validated, model or deleted)")]
pub struct ParseStatusError(String);

impl std::str::FromStr for ClassifiedSentenceStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// A labeled span of a sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub role: String,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_entities: Vec<ClassifiedEntity>,
}

impl ClassifiedEntity {
    pub fn new(entity_type: impl Into<String>, role: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            entity_type: entity_type.into(),
            role: role.into(),
            start,
            end,
            sub_entities: Vec::new(),
        }
    }
}

/// Intent plus entities assigned to a sentence by the classifier or a curator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub intent_id: String,
    #[serde(default)]
    pub entities: Vec<ClassifiedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities_probability: Option<f64>,
}

impl Classification {
    pub fn new(intent_id: impl Into<String>, entities: Vec<ClassifiedEntity>) -> Self {
        Self {
            intent_id: intent_id.into(),
            entities,
            intent_probability: None,
            entities_probability: None,
        }
    }
}

/// A training utterance and its labels.
///
/// Dates are persisted with millisecond precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedSentence {
    pub text: String,
    /// Locale tag such as `en` or `fr-FR`.
    pub language: String,
    pub application_id: String,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    #[serde(default)]
    pub status: ClassifiedSentenceStatus,
    pub classification: Classification,
}

impl ClassifiedSentence {
    /// New inbox sentence stamped with the current time, truncated to
    /// milliseconds so it survives a storage round trip unchanged.
    pub fn new(
        text: impl Into<String>,
        language: impl Into<String>,
        application_id: impl Into<String>,
        classification: Classification,
    ) -> Self {
        let now = Utc::now().trunc_subsecs(3);
        Self {
            text: text.into(),
            language: language.into(),
            application_id: application_id.into(),
            creation_date: now,
            update_date: now,
            status: ClassifiedSentenceStatus::Inbox,
            classification,
        }
    }

    pub fn with_status(mut self, status: ClassifiedSentenceStatus) -> Self {
        self.status = status;
        self
    }
}

/// Curation search over one application and language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentencesQuery {
    pub application_id: String,
    pub language: String,
    pub start: u64,
    pub size: usize,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub intent_id: Option<String>,
    /// When non-empty, only these statuses match and `not_status` is ignored.
    #[serde(default)]
    pub status: HashSet<ClassifiedSentenceStatus>,
    #[serde(default)]
    pub not_status: Option<ClassifiedSentenceStatus>,
    #[serde(default)]
    pub only_exact_match: bool,
}

impl SentencesQuery {
    pub fn new(application_id: impl Into<String>, language: impl Into<String>, start: u64, size: usize) -> Self {
        Self {
            application_id: application_id.into(),
            language: language.into(),
            start,
            size,
            search: None,
            intent_id: None,
            status: HashSet::new(),
            not_status: None,
            only_exact_match: false,
        }
    }
}

/// One page of a search plus the number of matching sentences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentencesQueryResult {
    pub total: u64,
    pub sentences: Vec<ClassifiedSentence>,
}

impl SentencesQueryResult {
    pub fn empty() -> Self {
        Self {
            total: 0,
            sentences: Vec::new(),
        }
    }
}
