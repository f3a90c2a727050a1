use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn base_cmd(db: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sentences"));
    cmd.env_remove("SENTENCES_DB_PATH")
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(db);
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().clone();
    serde_json::from_slice(&output.stdout).expect("valid json on stdout")
}

const SENTENCES: &str = r#"{"text":"Book a flight to Paris","language":"en","applicationId":"app","creationDate":"2024-01-01T00:00:00Z","updateDate":"2024-01-01T00:00:00Z","status":"inbox","classification":{"intentId":"travel","entities":[{"type":"city","role":"destination","start":17,"end":22}]}}
{"text":"What is the weather","language":"en","applicationId":"app","creationDate":"2024-01-01T00:00:00Z","updateDate":"2024-01-01T00:00:00Z","status":"validated","classification":{"intentId":"weather","entities":[]}}
{"text":"Bonjour","language":"fr","applicationId":"app","creationDate":"2024-01-01T00:00:00Z","updateDate":"2024-01-01T00:00:00Z","classification":{"intentId":"greetings"}}
"#;

fn imported() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sentences.db");
    let input = dir.path().join("sentences.jsonl");
    std::fs::write(&input, SENTENCES).unwrap();
    let json = json_stdout(base_cmd(&db).arg("import").arg(&input));
    assert_eq!(json["affected"], 3);
    (dir, db)
}

#[test]
fn list_without_selector_fails() {
    let (_dir, db) = imported();
    base_cmd(&db)
        .arg("list")
        .assert()
        .failure()
        .stderr(contains("invalid argument"));
}

#[test]
fn list_by_status() {
    let (_dir, db) = imported();
    let json = json_stdout(base_cmd(&db).args(["list", "--status", "inbox"]));
    let texts: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["Book a flight to Paris", "Bonjour"]);
}

#[test]
fn search_reports_total_and_page() {
    let (_dir, db) = imported();
    let json = json_stdout(base_cmd(&db).args([
        "search", "--app", "app", "--language", "en", "--size", "1",
    ]));
    assert_eq!(json["total"], 2);
    assert_eq!(json["sentences"][0]["text"], "What is the weather");

    let json = json_stdout(base_cmd(&db).args([
        "search", "--app", "app", "--language", "en", "--text", "FLIGHT",
    ]));
    assert_eq!(json["total"], 1);
}

#[test]
fn rewrite_commands_report_affected_rows() {
    let (_dir, db) = imported();
    let json = json_stdout(base_cmd(&db).args([
        "remove-entity", "--app", "app", "--intent", "travel", "--entity-type", "city", "--role",
        "destination",
    ]));
    assert_eq!(json["affected"], 1);

    let json = json_stdout(base_cmd(&db).args([
        "switch-intent", "--app", "app", "--from", "weather", "--to", "forecast",
    ]));
    assert_eq!(json["affected"], 1);

    let json = json_stdout(base_cmd(&db).args(["switch-status", "--language", "en", "--to", "model"]));
    assert_eq!(json["affected"], 2);

    let json = json_stdout(base_cmd(&db).args(["delete", "--status", "model"]));
    assert_eq!(json["affected"], 2);

    let json = json_stdout(base_cmd(&db).args(["delete", "--app", "app"]));
    assert_eq!(json["affected"], 1);
}

#[test]
fn unknown_status_is_rejected_by_parser() {
    let dir = TempDir::new().unwrap();
    base_cmd(&dir.path().join("sentences.db"))
        .args(["list", "--status", "archived"])
        .assert()
        .failure()
        .stderr(contains("unknown sentence status"));
}

#[test]
fn completions_do_not_touch_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sentences.db");
    base_cmd(&db)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("sentences"));
    assert!(!db.exists());
}
