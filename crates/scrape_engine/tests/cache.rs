use std::fs;

use pretty_assertions::assert_eq;
use scrape_engine::{ArticleCache, ArticleRecord, PersistError};
use tempfile::TempDir;

fn record(n: u64, content: &str) -> ArticleRecord {
    ArticleRecord {
        title: format!("Article {n}"),
        url: format!("https://blog.example.com/tester/article/details/{n}"),
        published_at: "2024-03-01 09:30:00".to_string(),
        read_count: n * 100,
        like_count: n,
        comment_count: 0,
        content: content.to_string(),
    }
}

#[test]
fn missing_cache_loads_as_none() {
    let dir = TempDir::new().unwrap();
    let cache = ArticleCache::new(dir.path().join("articles.json"));
    assert!(!cache.exists());
    assert!(cache.load().unwrap().is_none());
}

#[test]
fn saved_records_come_back_in_order() {
    let dir = TempDir::new().unwrap();
    let cache = ArticleCache::new(dir.path().join("nested/out/articles.json"));
    let records = vec![record(2, "body two"), record(1, "")];

    cache.save(&records).unwrap();
    assert!(cache.exists());
    assert_eq!(cache.load().unwrap(), Some(records));
}

#[test]
fn file_uses_flat_json_field_names() {
    let dir = TempDir::new().unwrap();
    let cache = ArticleCache::new(dir.path().join("articles.json"));
    cache.save(&[record(3, "text")]).unwrap();

    let raw = fs::read_to_string(cache.path()).unwrap();
    assert!(raw.ends_with('\n'));
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let first = &value[0];
    assert_eq!(first["title"], "Article 3");
    assert_eq!(first["publish_time"], "2024-03-01 09:30:00");
    assert_eq!(first["read_count"], 300);
    assert_eq!(first["like_count"], 3);
    assert_eq!(first["comment_count"], 0);
    assert_eq!(first["content"], "text");
    assert!(first.get("published_at").is_none());
}

#[test]
fn older_files_without_optional_fields_still_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("articles.json");
    fs::write(
        &path,
        r#"[{"title": "Old", "url": "https://blog.example.com/tester/article/details/1"}]"#,
    )
    .unwrap();

    let loaded = ArticleCache::new(&path).load().unwrap().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].title, "Old");
    assert_eq!(loaded[0].read_count, 0);
    assert!(!loaded[0].has_content());
}

#[test]
fn malformed_cache_is_a_format_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("articles.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ArticleCache::new(&path).load().unwrap_err();
    assert!(matches!(err, PersistError::Format { .. }));
}

#[test]
fn save_fails_when_parent_is_a_file() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "x").unwrap();

    let cache = ArticleCache::new(blocker.join("articles.json"));
    let err = cache.save(&[record(1, "")]).unwrap_err();
    assert!(matches!(err, PersistError::OutputDir(_)));
}

#[test]
fn save_replaces_previous_contents() {
    let dir = TempDir::new().unwrap();
    let cache = ArticleCache::new(dir.path().join("articles.json"));
    cache.save(&[record(1, ""), record(2, "")]).unwrap();
    cache.save(&[record(3, "fresh")]).unwrap();

    let loaded = cache.load().unwrap().unwrap();
    assert_eq!(loaded, vec![record(3, "fresh")]);
    let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}
