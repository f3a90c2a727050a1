use chrono::{DateTime, Utc};
use classified_sentences::model::types::{
    Classification, ClassifiedEntity, ClassifiedSentence, ClassifiedSentenceStatus,
};
use classified_sentences::storage::sqlite::SqliteSentenceStore;
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

#[allow(dead_code)]
struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Fresh on-disk store in a temp dir. Keep the dir alive for the test.
#[allow(dead_code)]
pub fn temp_store() -> (SqliteSentenceStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteSentenceStore::open(&dir.path().join("sentences.db")).expect("open store");
    (store, dir)
}

#[allow(dead_code)]
pub fn at(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
}

/// Builder for test sentences with millisecond-precision dates.
#[allow(dead_code)]
pub struct SentenceBuilder {
    sentence: ClassifiedSentence,
}

#[allow(dead_code)]
impl SentenceBuilder {
    pub fn new(text: &str) -> Self {
        Self {
            sentence: ClassifiedSentence {
                text: text.to_string(),
                language: "en".to_string(),
                application_id: "app".to_string(),
                creation_date: at(1_700_000_000_000),
                update_date: at(1_700_000_000_000),
                status: ClassifiedSentenceStatus::Inbox,
                classification: Classification::new("unknown", Vec::new()),
            },
        }
    }

    pub fn language(mut self, language: &str) -> Self {
        self.sentence.language = language.to_string();
        self
    }

    pub fn app(mut self, application_id: &str) -> Self {
        self.sentence.application_id = application_id.to_string();
        self
    }

    pub fn status(mut self, status: ClassifiedSentenceStatus) -> Self {
        self.sentence.status = status;
        self
    }

    pub fn intent(mut self, intent_id: &str) -> Self {
        self.sentence.classification.intent_id = intent_id.to_string();
        self
    }

    pub fn entity(mut self, entity_type: &str, role: &str) -> Self {
        let start = self.sentence.classification.entities.len();
        self.sentence
            .classification
            .entities
            .push(ClassifiedEntity::new(entity_type, role, start, start + 1));
        self
    }

    pub fn updated(mut self, millis: i64) -> Self {
        self.sentence.update_date = at(millis);
        self
    }

    pub fn build(self) -> ClassifiedSentence {
        self.sentence
    }
}
