//! `SQLite` backend: schema, pragmas, migrations and sentence CRUD.

use super::filter::{CONTAINS_CI_FN, SentenceFilter};
use super::key::text_key;
use super::rewrite::SentenceRewriter;
use super::{ClassifiedSentenceDao, StoreError, StoreResult};
use crate::model::types::{
    Classification, ClassifiedSentence, ClassifiedSentenceStatus, SentencesQuery,
    SentencesQueryResult,
};
use crate::search::query::SentenceSearcher;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

// -------------------------------------------------------------------------
// Lazy store handle
// -------------------------------------------------------------------------
// Defers opening the database (and creating its indexes) until first use.
// The opened store is cached for the lifetime of the handle.

/// Error from lazy store initialization.
#[derive(Debug, Error)]
pub enum LazyStoreError {
    #[error("Failed to open sentence store at {path}: {source}")]
    OpenFailed { path: PathBuf, source: StoreError },
}

/// A lazily-initialized, thread-safe sentence store handle.
///
/// Constructing a `LazySentenceStore` is cheap (no I/O). The store is opened
/// on the first call to [`get`](Self::get); later calls share the same store.
pub struct LazySentenceStore {
    path: PathBuf,
    options: StoreOptions,
    store: Mutex<Option<Arc<SqliteSentenceStore>>>,
}

impl LazySentenceStore {
    /// Create a lazy handle pointing at `path`. No I/O is performed.
    pub fn new(path: PathBuf) -> Self {
        Self::with_options(path, StoreOptions::default())
    }

    pub fn with_options(path: PathBuf, options: StoreOptions) -> Self {
        Self {
            path,
            options,
            store: Mutex::new(None),
        }
    }

    /// Get the store, opening it on first access.
    ///
    /// `reason` is logged alongside the open duration.
    pub fn get(&self, reason: &str) -> Result<Arc<SqliteSentenceStore>, LazyStoreError> {
        let mut guard = self.store.lock();
        if let Some(store) = guard.as_ref() {
            return Ok(Arc::clone(store));
        }
        let start = Instant::now();
        let store = SqliteSentenceStore::open_with_options(&self.path, &self.options)
            .map(Arc::new)
            .map_err(|source| LazyStoreError::OpenFailed {
                path: self.path.clone(),
                source,
            })?;
        info!(
            path = %self.path.display(),
            elapsed_ms = start.elapsed().as_millis(),
            reason = reason,
            "lazily opened sentence store"
        );
        *guard = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Path to the database file (even if not yet opened).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store has been opened.
    pub fn is_open(&self) -> bool {
        self.store.lock().is_some()
    }
}

// -------------------------------------------------------------------------
// Schema
// -------------------------------------------------------------------------

/// Public schema version constant for external checks.
pub const CURRENT_SCHEMA_VERSION: i64 = SCHEMA_VERSION;

const SCHEMA_VERSION: i64 = 1;

const MIGRATION_V1: &str = r"
CREATE TABLE IF NOT EXISTS classified_sentences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text_key TEXT NOT NULL,
    full_text TEXT NOT NULL,
    language TEXT NOT NULL,
    application_id TEXT NOT NULL,
    creation_date INTEGER NOT NULL,
    update_date INTEGER NOT NULL,
    status TEXT NOT NULL,
    intent_id TEXT NOT NULL,
    classification_json TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_sentences_key
    ON classified_sentences(text_key, language, application_id);

CREATE INDEX IF NOT EXISTS idx_sentences_lang_app_status
    ON classified_sentences(language, application_id, status);

CREATE INDEX IF NOT EXISTS idx_sentences_status
    ON classified_sentences(status);

CREATE INDEX IF NOT EXISTS idx_sentences_lang_status_intent
    ON classified_sentences(language, status, intent_id);
";

const SELECT_COLUMNS: &str = "id, text_key, full_text, language, application_id, creation_date, \
     update_date, status, intent_id, classification_json";

/// Connection tuning for a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Window of a sorted result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: u64,
    pub size: usize,
}

/// Storage shape of a sentence. Never handed to callers.
#[derive(Debug, Clone)]
pub(crate) struct SentenceRecord {
    pub id: Option<i64>,
    pub text_key: String,
    pub full_text: String,
    pub language: String,
    pub application_id: String,
    pub creation_date: i64,
    pub update_date: i64,
    pub status: String,
    pub intent_id: String,
    pub classification_json: String,
}

impl SentenceRecord {
    pub fn from_sentence(sentence: &ClassifiedSentence) -> StoreResult<Self> {
        Ok(Self {
            id: None,
            text_key: text_key(&sentence.text).to_string(),
            full_text: sentence.text.clone(),
            language: sentence.language.clone(),
            application_id: sentence.application_id.clone(),
            creation_date: sentence.creation_date.timestamp_millis(),
            update_date: sentence.update_date.timestamp_millis(),
            status: sentence.status.as_str().to_string(),
            intent_id: sentence.classification.intent_id.clone(),
            classification_json: serde_json::to_string(&sentence.classification)?,
        })
    }

    pub fn into_sentence(self) -> StoreResult<ClassifiedSentence> {
        let id = self.id.unwrap_or_default();
        let corrupt = |reason: String| StoreError::CorruptRecord { id, reason };
        let status = ClassifiedSentenceStatus::parse(&self.status)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", self.status)))?;
        let creation_date = millis_to_datetime(self.creation_date)
            .ok_or_else(|| corrupt(format!("bad creation_date {}", self.creation_date)))?;
        let update_date = millis_to_datetime(self.update_date)
            .ok_or_else(|| corrupt(format!("bad update_date {}", self.update_date)))?;
        let classification: Classification = serde_json::from_str(&self.classification_json)?;
        Ok(ClassifiedSentence {
            text: self.full_text,
            language: self.language,
            application_id: self.application_id,
            creation_date,
            update_date,
            status,
            classification,
        })
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SentenceRecord> {
    Ok(SentenceRecord {
        id: Some(row.get(0)?),
        text_key: row.get(1)?,
        full_text: row.get(2)?,
        language: row.get(3)?,
        application_id: row.get(4)?,
        creation_date: row.get(5)?,
        update_date: row.get(6)?,
        status: row.get(7)?,
        intent_id: row.get(8)?,
        classification_json: row.get(9)?,
    })
}

// -------------------------------------------------------------------------
// Store
// -------------------------------------------------------------------------

/// Classified sentence store backed by one `SQLite` connection.
///
/// The connection is guarded by a mutex, so a store can be shared across
/// threads behind an `Arc`. Each statement is atomic; nothing spans calls.
#[derive(Debug)]
pub struct SqliteSentenceStore {
    conn: Mutex<Connection>,
}

impl SqliteSentenceStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_options(path, &StoreOptions::default())
    }

    /// Open (creating if needed) the database at `path` and bring its schema
    /// and indexes up to date. Safe to call repeatedly on the same file.
    pub fn open_with_options(path: &Path, options: &StoreOptions) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        apply_pragmas(&conn, options)?;
        Self::init(&mut conn)?;
        debug!(path = %path.display(), "opened sentence store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory store, mostly for tests and benchmarks.
    pub fn open_in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.busy_timeout(StoreOptions::default().busy_timeout)?;
        Self::init(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &mut Connection) -> StoreResult<()> {
        register_functions(conn)?;
        init_meta(conn)?;
        migrate(conn)
    }

    /// Exclusive access to the underlying connection.
    pub fn raw(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    pub fn schema_version(&self) -> StoreResult<i64> {
        read_schema_version(&self.conn.lock())?.ok_or_else(|| {
            StoreError::InvalidArgument("schema_version missing from meta table".to_string())
        })
    }

    /// Sentences matching `filter`: storage order without a page, most
    /// recently inserted first with one.
    pub fn find(
        &self,
        filter: &SentenceFilter,
        page: Option<Page>,
    ) -> StoreResult<Vec<ClassifiedSentence>> {
        find_matching(&self.conn.lock(), filter, page)
    }

    pub fn count(&self, filter: &SentenceFilter) -> StoreResult<u64> {
        count_matching(&self.conn.lock(), filter)
    }

    pub fn get_sentences(
        &self,
        intents: Option<&HashSet<String>>,
        language: Option<&str>,
        status: Option<ClassifiedSentenceStatus>,
    ) -> StoreResult<Vec<ClassifiedSentence>> {
        let filter = SentenceFilter::for_sentences(intents, language, status)?;
        self.find(&filter, None)
    }

    /// Insert or fully replace the record for the sentence's
    /// (text key, language, application). Dates are stored as given.
    pub fn save(&self, sentence: &ClassifiedSentence) -> StoreResult<()> {
        save_record(&self.conn.lock(), &SentenceRecord::from_sentence(sentence)?)
    }

    pub fn delete_sentences_by_status(&self, status: ClassifiedSentenceStatus) -> StoreResult<usize> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM classified_sentences WHERE status = ?",
            params![status.as_str()],
        )?;
        info!(status = %status, deleted, "deleted sentences by status");
        Ok(deleted)
    }

    pub fn delete_sentences_by_application_id(&self, application_id: &str) -> StoreResult<usize> {
        let deleted = self.conn.lock().execute(
            "DELETE FROM classified_sentences WHERE application_id = ?",
            params![application_id],
        )?;
        info!(application_id, deleted, "deleted sentences by application");
        Ok(deleted)
    }
}

impl ClassifiedSentenceDao for SqliteSentenceStore {
    fn get_sentences(
        &self,
        intents: Option<&HashSet<String>>,
        language: Option<&str>,
        status: Option<ClassifiedSentenceStatus>,
    ) -> StoreResult<Vec<ClassifiedSentence>> {
        SqliteSentenceStore::get_sentences(self, intents, language, status)
    }

    fn switch_sentences_status(
        &self,
        sentences: &[ClassifiedSentence],
        new_status: ClassifiedSentenceStatus,
    ) -> StoreResult<()> {
        SentenceRewriter::new(self).switch_sentences_status(sentences, new_status)
    }

    fn delete_sentences_by_status(&self, status: ClassifiedSentenceStatus) -> StoreResult<usize> {
        SqliteSentenceStore::delete_sentences_by_status(self, status)
    }

    fn delete_sentences_by_application_id(&self, application_id: &str) -> StoreResult<usize> {
        SqliteSentenceStore::delete_sentences_by_application_id(self, application_id)
    }

    fn save(&self, sentence: &ClassifiedSentence) -> StoreResult<()> {
        SqliteSentenceStore::save(self, sentence)
    }

    fn search(&self, query: &SentencesQuery) -> StoreResult<SentencesQueryResult> {
        SentenceSearcher::new(self).search(query)
    }

    fn switch_sentences_intent(
        &self,
        application_id: &str,
        old_intent_id: &str,
        new_intent_id: &str,
    ) -> StoreResult<usize> {
        SentenceRewriter::new(self).switch_sentences_intent(
            application_id,
            old_intent_id,
            new_intent_id,
        )
    }

    fn remove_entity_from_sentences(
        &self,
        application_id: &str,
        intent_id: &str,
        entity_type: &str,
        role: &str,
    ) -> StoreResult<usize> {
        SentenceRewriter::new(self).remove_entity_from_sentences(
            application_id,
            intent_id,
            entity_type,
            role,
        )
    }
}

// -------------------------------------------------------------------------
// Statement helpers shared with the searcher and the rewriter
// -------------------------------------------------------------------------

pub(crate) fn find_matching(
    conn: &Connection,
    filter: &SentenceFilter,
    page: Option<Page>,
) -> StoreResult<Vec<ClassifiedSentence>> {
    find_records(conn, filter, page)?
        .into_iter()
        .map(SentenceRecord::into_sentence)
        .collect()
}

pub(crate) fn find_records(
    conn: &Connection,
    filter: &SentenceFilter,
    page: Option<Page>,
) -> StoreResult<Vec<SentenceRecord>> {
    let (where_sql, mut values) = filter.to_sql();
    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM classified_sentences WHERE {where_sql}");
    match page {
        Some(page) => {
            sql.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");
            values.push(to_sql_int(page.size as u64).into());
            values.push(to_sql_int(page.start).into());
        }
        None => sql.push_str(" ORDER BY id"),
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), row_to_record)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub(crate) fn count_matching(conn: &Connection, filter: &SentenceFilter) -> StoreResult<u64> {
    let (where_sql, values) = filter.to_sql();
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM classified_sentences WHERE {where_sql}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or_default())
}

pub(crate) fn save_record(conn: &Connection, record: &SentenceRecord) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO classified_sentences(text_key, full_text, language, application_id,
             creation_date, update_date, status, intent_id, classification_json)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(text_key, language, application_id) DO UPDATE SET
             full_text = excluded.full_text,
             creation_date = excluded.creation_date,
             update_date = excluded.update_date,
             status = excluded.status,
             intent_id = excluded.intent_id,
             classification_json = excluded.classification_json",
        params![
            record.text_key,
            record.full_text,
            record.language,
            record.application_id,
            record.creation_date,
            record.update_date,
            record.status,
            record.intent_id,
            record.classification_json,
        ],
    )?;
    Ok(())
}

fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// -------------------------------------------------------------------------
// Connection setup
// -------------------------------------------------------------------------

fn apply_pragmas(conn: &Connection, options: &StoreOptions) -> StoreResult<()> {
    conn.busy_timeout(options.busy_timeout)?;
    conn.execute_batch(
        r"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA temp_store = MEMORY;
        PRAGMA cache_size = -16384; -- 16MB
        ",
    )?;
    Ok(())
}

fn register_functions(conn: &Connection) -> StoreResult<()> {
    conn.create_scalar_function(
        CONTAINS_CI_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack = ctx.get::<Option<String>>(0)?;
            let needle = ctx.get::<Option<String>>(1)?;
            Ok(match (haystack, needle) {
                (Some(h), Some(n)) => contains_ignore_case(&h, &n),
                _ => false,
            })
        },
    )?;
    Ok(())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0).map(|s| s.parse().unwrap_or(0)),
    )
    .optional()
}

fn init_meta(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;
    // Start at version 0 so migrate() applies the full schema on first open.
    // Concurrent first opens race here; the loser's insert is a no-op.
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES('schema_version', '0')",
        [],
    )?;
    Ok(())
}

fn migrate(conn: &mut Connection) -> StoreResult<()> {
    if read_schema_version(conn)? == Some(SCHEMA_VERSION) {
        return Ok(());
    }

    // Take the write lock before re-reading so only one connection migrates.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = read_schema_version(&tx)?.unwrap_or(0);
    if current == SCHEMA_VERSION {
        return Ok(());
    }
    if current > SCHEMA_VERSION {
        return Err(StoreError::InvalidArgument(format!(
            "schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    if current < 1 {
        tx.execute_batch(MIGRATION_V1)?;
    }
    tx.execute(
        "UPDATE meta SET value = ? WHERE key = 'schema_version'",
        params![SCHEMA_VERSION.to_string()],
    )?;
    tx.commit()?;
    info!(from = current, to = SCHEMA_VERSION, "migrated sentence store schema");
    Ok(())
}
