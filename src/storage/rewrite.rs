//! Bulk relabeling of stored sentences.

use super::StoreResult;
use super::filter::{Predicate, SentenceFilter};
use super::sqlite::{SqliteSentenceStore, find_records};
use crate::model::types::{Classification, ClassifiedSentence, ClassifiedSentenceStatus};
use rusqlite::params;
use tracing::{debug, info};

/// Status, intent and entity rewrites across many sentences.
pub struct SentenceRewriter<'a> {
    store: &'a SqliteSentenceStore,
}

impl<'a> SentenceRewriter<'a> {
    pub fn new(store: &'a SqliteSentenceStore) -> Self {
        Self { store }
    }

    /// Re-save each sentence with `new_status`.
    ///
    /// Best effort: the first failing save aborts the loop and the sentences
    /// already saved stay switched.
    pub fn switch_sentences_status(
        &self,
        sentences: &[ClassifiedSentence],
        new_status: ClassifiedSentenceStatus,
    ) -> StoreResult<()> {
        for (i, sentence) in sentences.iter().enumerate() {
            let mut switched = sentence.clone();
            switched.status = new_status;
            self.store.save(&switched).inspect_err(|e| {
                debug!(switched = i, total = sentences.len(), error = %e, "status switch aborted");
            })?;
        }
        info!(count = sentences.len(), status = %new_status, "switched sentence status");
        Ok(())
    }

    /// Move every sentence of `application_id` labeled `old_intent_id` to
    /// `new_intent_id`, dropping its entities and sending it back to the inbox.
    ///
    /// Runs as a single `UPDATE`.
    pub fn switch_sentences_intent(
        &self,
        application_id: &str,
        old_intent_id: &str,
        new_intent_id: &str,
    ) -> StoreResult<usize> {
        let updated = self.store.raw().execute(
            "UPDATE classified_sentences SET
                 intent_id = ?1,
                 status = ?2,
                 classification_json = json_set(classification_json,
                     '$.intentId', ?1,
                     '$.entities', json('[]'))
             WHERE application_id = ?3 AND intent_id = ?4",
            params![
                new_intent_id,
                ClassifiedSentenceStatus::Inbox.as_str(),
                application_id,
                old_intent_id
            ],
        )?;
        info!(
            application_id,
            from = old_intent_id,
            to = new_intent_id,
            updated,
            "switched sentence intent"
        );
        Ok(updated)
    }

    /// Remove every top-level entity with `role` from the sentences of
    /// `application_id` labeled `intent_id`. Other entities and fields are kept.
    ///
    /// Roles are unique within an intent, so `entity_type` does not narrow the
    /// match. All matched sentences are rewritten in one transaction.
    pub fn remove_entity_from_sentences(
        &self,
        application_id: &str,
        intent_id: &str,
        entity_type: &str,
        role: &str,
    ) -> StoreResult<usize> {
        let filter = SentenceFilter::new()
            .and(Predicate::ApplicationId(application_id.to_string()))
            .and(Predicate::IntentId(intent_id.to_string()))
            .and(Predicate::HasEntityRole(role.to_string()));

        let conn = self.store.raw();
        let tx = conn.unchecked_transaction()?;
        let records = find_records(&tx, &filter, None)?;
        let mut updated = 0;
        for record in records {
            let mut classification: Classification =
                serde_json::from_str(&record.classification_json)?;
            classification.entities.retain(|e| e.role != role);
            updated += tx.execute(
                "UPDATE classified_sentences SET classification_json = ? WHERE id = ?",
                params![serde_json::to_string(&classification)?, record.id],
            )?;
        }
        tx.commit()?;

        info!(
            application_id,
            intent_id,
            entity_type,
            role,
            updated,
            "removed entity role from sentences"
        );
        Ok(updated)
    }
}
