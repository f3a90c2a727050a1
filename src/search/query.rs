//! Paged curation search.

use crate::model::types::{SentencesQuery, SentencesQueryResult};
use crate::storage::StoreResult;
use crate::storage::filter::SentenceFilter;
use crate::storage::sqlite::{Page, SqliteSentenceStore, count_matching, find_matching};
use tracing::debug;

/// Runs [`SentencesQuery`]s against a store: count first, then one page.
pub struct SentenceSearcher<'a> {
    store: &'a SqliteSentenceStore,
}

impl<'a> SentenceSearcher<'a> {
    pub fn new(store: &'a SqliteSentenceStore) -> Self {
        Self { store }
    }

    /// Count the matching sentences and return the page starting at
    /// `query.start`, most recently inserted first.
    ///
    /// When `start` is at or past the match count the result is empty and its
    /// total is reported as 0, not as the real count.
    pub fn search(&self, query: &SentencesQuery) -> StoreResult<SentencesQueryResult> {
        let filter = SentenceFilter::for_query(query);
        // Count and page under one lock so they observe the same rows.
        let conn = self.store.raw();
        let total = count_matching(&conn, &filter)?;
        debug!(
            application_id = %query.application_id,
            language = %query.language,
            total,
            start = query.start,
            size = query.size,
            "sentence search"
        );
        if total <= query.start {
            return Ok(SentencesQueryResult::empty());
        }
        let page = Page {
            start: query.start,
            size: query.size,
        };
        let sentences = find_matching(&conn, &filter, Some(page))?;
        Ok(SentencesQueryResult { total, sentences })
    }
}
