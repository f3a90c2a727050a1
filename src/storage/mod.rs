//! Persistence for classified sentences.

pub mod filter;
pub mod key;
pub mod rewrite;
pub mod sqlite;

use crate::model::types::{
    ClassifiedSentence, ClassifiedSentenceStatus, SentencesQuery, SentencesQueryResult,
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised by the sentence store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller supplied arguments the operation cannot run with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be mapped back to a sentence.
    #[error("corrupt record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations the NLP configuration service performs on classified sentences.
///
/// Every write is atomic per sentence only. `switch_sentences_status` is a
/// best-effort loop: a failure on one sentence stops the loop and leaves the
/// sentences before it switched.
pub trait ClassifiedSentenceDao {
    /// Sentences matching every provided dimension. Fails with
    /// [`StoreError::InvalidArgument`] when all three are `None`.
    fn get_sentences(
        &self,
        intents: Option<&HashSet<String>>,
        language: Option<&str>,
        status: Option<ClassifiedSentenceStatus>,
    ) -> StoreResult<Vec<ClassifiedSentence>>;

    fn switch_sentences_status(
        &self,
        sentences: &[ClassifiedSentence],
        new_status: ClassifiedSentenceStatus,
    ) -> StoreResult<()>;

    fn delete_sentences_by_status(&self, status: ClassifiedSentenceStatus) -> StoreResult<usize>;

    fn delete_sentences_by_application_id(&self, application_id: &str) -> StoreResult<usize>;

    /// Insert or replace the sentence keyed by text key, language and application.
    fn save(&self, sentence: &ClassifiedSentence) -> StoreResult<()>;

    fn search(&self, query: &SentencesQuery) -> StoreResult<SentencesQueryResult>;

    fn switch_sentences_intent(
        &self,
        application_id: &str,
        old_intent_id: &str,
        new_intent_id: &str,
    ) -> StoreResult<usize>;

    fn remove_entity_from_sentences(
        &self,
        application_id: &str,
        intent_id: &str,
        entity_type: &str,
        role: &str,
    ) -> StoreResult<usize>;
}
