//! Library-level tests for the import pipeline against both store backends.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use story_book::error::ImportError;
use story_book::import::{discover, parse, trigger_import, ImportOptions, ImportSpec};
use story_book::migrate::apply_schema;
use story_book::models::{DocumentKey, Record, StoredDocument, UpsertOutcome};
use story_book::progress::NoProgress;
use story_book::store::memory::InMemoryCollection;
use story_book::store::sqlite::SqliteCollection;
use story_book::store::Collection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Collection that goes away on its `fail_at`-th upsert (1-based).
struct FlakyCollection {
    inner: InMemoryCollection,
    upserts: AtomicUsize,
    fail_at: usize,
}

#[async_trait]
impl Collection for FlakyCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn upsert(&self, key: &DocumentKey, record: &Record) -> Result<UpsertOutcome> {
        if self.upserts.fetch_add(1, Ordering::SeqCst) + 1 >= self.fail_at {
            anyhow::bail!("connection refused");
        }
        self.inner.upsert(key, record).await
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>> {
        self.inner.get(key).await
    }

    async fn find_one(&self, field: &str, value: &Value) -> Result<Option<StoredDocument>> {
        self.inner.find_one(field, value).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn spec<'a>(root: &Path, collection: &'a dyn Collection, key: &str, suffix: &str) -> ImportSpec<'a> {
    ImportSpec {
        root: root.to_path_buf(),
        collection,
        key_field: key.to_string(),
        suffix: suffix.to_string(),
    }
}

async fn sqlite_pool(dir: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(&format!(
        "sqlite:{}",
        dir.join("store.sqlite").display()
    ))
    .unwrap()
    .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .unwrap();
    apply_schema(&pool).await.unwrap();
    pool
}

fn category_files(dir: &Path) {
    write(
        dir,
        "a_category.json",
        r#"[{"category_id": 1, "name": "Rust", "url": "rust"},
            {"category_id": 2, "name": "Go", "url": "go"}]"#,
    );
    write(
        dir,
        "b_category.json",
        r#"{"categories": [{"category_id": 3, "name": "Travel", "url": "travel"}]}"#,
    );
}

#[test]
fn test_discover_filters_by_suffix() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a_category.json", "[]");
    write(tmp.path(), "a_gallery.json", "[]");
    write(tmp.path(), "notes.txt", "hello");
    write(tmp.path(), "B_CATEGORY.JSON", "[]");
    fs::create_dir(tmp.path().join("nested_category.json")).unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();
    write(&tmp.path().join("sub"), "z_category.json", "[]");

    let files = discover(tmp.path(), "_category.json").unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a_category.json"]);
    assert!(files[0].is_absolute());
}

#[test]
fn test_discover_is_sorted() {
    let tmp = TempDir::new().unwrap();
    for name in ["c_gallery.json", "a_gallery.json", "b_gallery.json"] {
        write(tmp.path(), name, "[]");
    }
    let names: Vec<String> = discover(tmp.path(), "_gallery.json")
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a_gallery.json", "b_gallery.json", "c_gallery.json"]);
}

#[test]
fn test_discover_missing_root() {
    let tmp = TempDir::new().unwrap();
    let err = discover(&tmp.path().join("missing"), "_category.json").unwrap_err();
    assert!(matches!(err, ImportError::PathNotFound(_)));
}

#[test]
fn test_parse_object_of_arrays() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "x_category.json",
        r#"{"foo":[{"category_id":1,"name":"A"}]}"#,
    );
    let records = parse(&tmp.path().join("x_category.json")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        Value::Object(records[0].clone()),
        json!({"category_id": 1, "name": "A"})
    );
}

#[test]
fn test_parse_malformed_file() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "bad_category.json", "[{\"category_id\": 1,");
    let err = parse(&tmp.path().join("bad_category.json")).unwrap_err();
    assert!(matches!(err, ImportError::Parse { .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_import_twice_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    category_files(tmp.path());
    let col = InMemoryCollection::new("category");
    let spec = spec(tmp.path(), &col, "category_id", "_category.json");

    let first = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(first.files_processed, 2);
    assert_eq!(first.records_inserted, 3);
    assert_eq!(first.records_replaced, 0);
    assert!(first.is_clean());

    let before: Vec<Value> = col
        .documents()
        .into_iter()
        .map(|d| Value::Object(d.body))
        .collect();

    let second = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(second.records_inserted, 0);
    assert_eq!(second.records_replaced, 3);

    let after: Vec<Value> = col
        .documents()
        .into_iter()
        .map(|d| Value::Object(d.body))
        .collect();
    assert_eq!(before, after);
    assert_eq!(col.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_missing_key_is_reported_and_not_stored() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "a_gallery.json",
        r#"[{"gallery_id": 1, "filename": "a.png"},
            {"filename": "orphan.png"},
            {"gallery_id": 3, "filename": "c.png"}]"#,
    );
    let col = InMemoryCollection::new("gallery");
    let spec = spec(tmp.path(), &col, "gallery_id", "_gallery.json");

    let report = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.records_inserted, 2);
    assert_eq!(report.records_failed.len(), 1);
    assert_eq!(report.records_failed[0].index, 1);
    assert!(matches!(
        report.records_failed[0].error,
        ImportError::MissingKeyField { .. }
    ));
    assert!(col
        .find_one("filename", &json!("orphan.png"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_malformed_file_does_not_stop_the_run() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a_category.json", "{not json");
    write(
        tmp.path(),
        "b_category.json",
        r#"[{"category_id": 9, "name": "After"}]"#,
    );
    let col = InMemoryCollection::new("category");
    let spec = spec(tmp.path(), &col, "category_id", "_category.json");

    let report = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.files_processed, 1);
    assert_eq!(report.files_failed.len(), 1);
    assert!(report.files_failed[0].path.ends_with("a_category.json"));
    assert_eq!(report.records_inserted, 1);
    let key = DocumentKey::from_value(&json!(9)).unwrap();
    assert!(col.get(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_nonexistent_root_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let col = InMemoryCollection::new("blog");
    let spec = spec(
        &tmp.path().join("nope"),
        &col,
        "blog_id",
        "_main_blog.json",
    );

    let err = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::PathNotFound(_)));
    assert_eq!(col.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_key_in_one_file_last_wins() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "a_main_blog.json",
        r#"[{"blog_id": 5, "title": "draft"}, {"blog_id": 5, "title": "final"}]"#,
    );
    let col = InMemoryCollection::new("blog");
    let spec = spec(tmp.path(), &col, "blog_id", "_main_blog.json");

    let report = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(report.records_inserted, 1);
    assert_eq!(report.records_replaced, 1);

    let doc = col
        .get(&DocumentKey::from_value(&json!(5)).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.body.get("title"), Some(&json!("final")));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    category_files(tmp.path());
    write(tmp.path(), "c_category.json", r#"[{"name": "no key"}]"#);
    let col = InMemoryCollection::new("category");
    let spec = spec(tmp.path(), &col, "category_id", "_category.json");

    let report = trigger_import(&spec, ImportOptions { dry_run: true }, &NoProgress)
        .await
        .unwrap();
    assert_eq!(report.records_skipped, 3);
    assert_eq!(report.records_inserted, 0);
    assert_eq!(report.records_failed.len(), 1);
    assert_eq!(col.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sqlite_import_round_trip() {
    let data = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    category_files(data.path());
    let pool = sqlite_pool(db_dir.path()).await;
    let col = SqliteCollection::new(pool.clone(), "category");
    let spec = spec(data.path(), &col, "category_id", "_category.json");

    let first = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();
    let second = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(first.records_inserted + second.records_replaced, 6);
    assert_eq!(second.records_inserted, 0);
    assert_eq!(col.count().await.unwrap(), 3);

    let travel = col
        .find_one("url", &json!("travel"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(travel.revision, 2);
    assert_eq!(
        Value::Object(travel.body),
        json!({"category_id": 3, "name": "Travel", "url": "travel"})
    );

    pool.close().await;
}

#[tokio::test]
async fn test_unknown_fields_are_preserved() {
    let data = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    let record = json!({
        "blog_id": 11,
        "blog_code": "main",
        "url": "hello-world",
        "category_url": "rust",
        "date": "2021-02-03 10:00:00",
        "tags": ["intro", "meta"],
        "author": {"name": "Sam", "avatar": null}
    });
    write(
        data.path(),
        "2021_main_blog.json",
        &serde_json::to_string(&json!([record.clone()])).unwrap(),
    );
    let pool = sqlite_pool(db_dir.path()).await;
    let col = SqliteCollection::new(pool.clone(), "blog");
    let spec = spec(data.path(), &col, "blog_id", "_main_blog.json");

    trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();

    let doc = col
        .get(&DocumentKey::from_value(&json!(11)).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Value::Object(doc.body), record);

    pool.close().await;
}

#[tokio::test]
async fn test_integral_float_key_replaces_integer_key() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a_main_blog.json", r#"[{"blog_id": 1, "title": "int"}]"#);
    write(tmp.path(), "b_main_blog.json", r#"[{"blog_id": 1.0, "title": "float"}]"#);
    let col = InMemoryCollection::new("blog");
    let spec = spec(tmp.path(), &col, "blog_id", "_main_blog.json");

    let report = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(report.records_inserted, 1);
    assert_eq!(report.records_replaced, 1);
    assert_eq!(col.count().await.unwrap(), 1);

    let doc = col
        .get(&DocumentKey::from_value(&json!(1)).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.body.get("title"), Some(&json!("float")));
}

#[tokio::test]
async fn test_store_failure_stops_run_and_keeps_earlier_writes() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "a_gallery.json",
        r#"[{"gallery_id": 1}, {"gallery_id": 2}]"#,
    );
    write(
        tmp.path(),
        "b_gallery.json",
        r#"[{"gallery_id": 3}, {"gallery_id": 4}]"#,
    );
    write(tmp.path(), "c_gallery.json", r#"[{"gallery_id": 5}]"#);
    let col = FlakyCollection {
        inner: InMemoryCollection::new("gallery"),
        upserts: AtomicUsize::new(0),
        fail_at: 3,
    };
    let spec = spec(tmp.path(), &col, "gallery_id", "_gallery.json");

    let err = trigger_import(&spec, ImportOptions::default(), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::StoreUnavailable(_)));
    assert!(err.is_fatal());

    // No rollback: the first file's records stay.
    let stored: Vec<Value> = col
        .inner
        .documents()
        .into_iter()
        .map(|d| d.body["gallery_id"].clone())
        .collect();
    assert_eq!(stored, vec![json!(1), json!(2)]);
    // The run stopped at the first failing upsert; c_gallery.json was never read.
    assert_eq!(col.upserts.load(Ordering::SeqCst), 3);
}
