//! Typed predicates over stored sentences.
//!
//! A [`SentenceFilter`] is a conjunction of [`Predicate`]s. It is rendered to a
//! parameterized SQL `WHERE` body; values are always bound, never interpolated.

use super::{StoreError, StoreResult};
use crate::model::types::{ClassifiedSentenceStatus, SentencesQuery};
use rusqlite::types::Value;
use std::collections::HashSet;

/// Name of the SQL function registered on every store connection for
/// case-insensitive containment.
pub(crate) const CONTAINS_CI_FN: &str = "sentence_contains_ci";

/// One matching condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    ApplicationId(String),
    Language(String),
    /// Intent is one of the listed ids. An empty list matches nothing.
    IntentIn(Vec<String>),
    IntentId(String),
    Status(ClassifiedSentenceStatus),
    StatusIn(Vec<ClassifiedSentenceStatus>),
    StatusNot(ClassifiedSentenceStatus),
    /// Full text equals the value.
    TextEquals(String),
    /// Full text contains the value, ignoring case.
    TextContains(String),
    /// At least one top-level entity has this role.
    HasEntityRole(String),
}

impl Predicate {
    fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Self::ApplicationId(id) => bind(sql, params, "application_id = ?", id),
            Self::Language(lang) => bind(sql, params, "language = ?", lang),
            Self::IntentId(id) => bind(sql, params, "intent_id = ?", id),
            Self::IntentIn(ids) => {
                in_list(sql, params, "intent_id", ids.iter().map(String::as_str))
            }
            Self::Status(status) => bind(sql, params, "status = ?", status.as_str()),
            Self::StatusIn(statuses) => in_list(
                sql,
                params,
                "status",
                statuses.iter().map(ClassifiedSentenceStatus::as_str),
            ),
            Self::StatusNot(status) => bind(sql, params, "status != ?", status.as_str()),
            Self::TextEquals(text) => bind(sql, params, "full_text = ?", text),
            Self::TextContains(text) => {
                sql.push_str(CONTAINS_CI_FN);
                sql.push_str("(full_text, ?)");
                params.push(Value::Text(text.clone()));
            }
            Self::HasEntityRole(role) => bind(
                sql,
                params,
                "EXISTS (SELECT 1 FROM json_each(classification_json, '$.entities') AS e \
                 WHERE json_extract(e.value, '$.role') = ?)",
                role,
            ),
        }
    }
}

fn bind(sql: &mut String, params: &mut Vec<Value>, clause: &str, value: &str) {
    sql.push_str(clause);
    params.push(Value::Text(value.to_string()));
}

fn in_list<'a>(
    sql: &mut String,
    params: &mut Vec<Value>,
    column: &str,
    values: impl Iterator<Item = &'a str>,
) {
    let start = params.len();
    params.extend(values.map(|v| Value::Text(v.to_string())));
    let n = params.len() - start;
    if n == 0 {
        sql.push('0');
        return;
    }
    sql.push_str(column);
    sql.push_str(" IN (");
    sql.push_str(&vec!["?"; n].join(", "));
    sql.push(')');
}

/// Conjunction of predicates. An empty filter matches every sentence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentenceFilter {
    predicates: Vec<Predicate>,
}

impl SentenceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn and_maybe(self, predicate: Option<Predicate>) -> Self {
        match predicate {
            Some(p) => self.and(p),
            None => self,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Filter for retrieval by intent set, language and/or status.
    ///
    /// At least one dimension is required; unbounded scans are rejected.
    pub fn for_sentences(
        intents: Option<&HashSet<String>>,
        language: Option<&str>,
        status: Option<ClassifiedSentenceStatus>,
    ) -> StoreResult<Self> {
        if intents.is_none() && language.is_none() && status.is_none() {
            return Err(StoreError::InvalidArgument(
                "at least one of intents, language or status must be provided".to_string(),
            ));
        }
        Ok(Self::new()
            .and_maybe(intents.map(|set| {
                let mut ids: Vec<String> = set.iter().cloned().collect();
                ids.sort();
                Predicate::IntentIn(ids)
            }))
            .and_maybe(language.map(|l| Predicate::Language(l.to_string())))
            .and_maybe(status.map(Predicate::Status)))
    }

    /// Filter for a curation search.
    pub fn for_query(query: &SentencesQuery) -> Self {
        Self::new()
            .and(Predicate::ApplicationId(query.application_id.clone()))
            .and(Predicate::Language(query.language.clone()))
            .and_maybe(text_predicate(query.search.as_deref(), query.only_exact_match))
            .and_maybe(
                query
                    .intent_id
                    .as_deref()
                    .filter(|id| !id.trim().is_empty())
                    .map(|id| Predicate::IntentId(id.to_string())),
            )
            .and_maybe(status_predicate(&query.status, query.not_status))
    }

    /// SQL `WHERE` body and its bound parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        if self.predicates.is_empty() {
            sql.push('1');
        }
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            sql.push('(');
            predicate.render(&mut sql, &mut params);
            sql.push(')');
        }
        (sql, params)
    }
}

/// Status constraint of a search: the inclusion list wins, then the exclusion.
pub fn status_predicate(
    status: &HashSet<ClassifiedSentenceStatus>,
    not_status: Option<ClassifiedSentenceStatus>,
) -> Option<Predicate> {
    if !status.is_empty() {
        let mut list: Vec<_> = status.iter().copied().collect();
        list.sort_by_key(|s| s.as_str());
        return Some(Predicate::StatusIn(list));
    }
    not_status.map(Predicate::StatusNot)
}

/// Free-text constraint of a search. Blank text adds nothing.
pub fn text_predicate(search: Option<&str>, only_exact_match: bool) -> Option<Predicate> {
    let search = search.filter(|s| !s.trim().is_empty())?;
    Some(if only_exact_match {
        Predicate::TextEquals(search.to_string())
    } else {
        Predicate::TextContains(search.trim().to_string())
    })
}
