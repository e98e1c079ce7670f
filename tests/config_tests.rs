use music_collection_bulk_ops::config::Config;
use music_collection_bulk_ops::engine::EngineOptions;
use music_collection_bulk_ops::executor::DispatchPolicy;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn partial_file_fills_in_defaults() {
    let td = tempdir().unwrap();
    let path = td.path().join("config.toml");
    fs::write(
        &path,
        r#"
base_url = "http://127.0.0.1:9000"
channel_name = "bes"
max_pages = 500
collection_concurrency = 8
"#,
    )
    .unwrap();

    let cfg = Config::from_path(&path).unwrap();
    assert_eq!(cfg.base_url, "http://127.0.0.1:9000");
    assert_eq!(cfg.page_size, 100);
    assert_eq!(cfg.legacy_page_size, 20);
    assert_eq!(cfg.max_pages, Some(500));
    assert_eq!(cfg.legacy_unhide_delay_ms, 2000);
    assert_eq!(cfg.import_delay_ms, 250);
    assert_eq!(cfg.collection_policy(), DispatchPolicy::Concurrent { limit: Some(8) });
}

#[test]
fn engine_profiles_follow_config() {
    let cfg = Config { base_url: "http://localhost:1".into(), ..Config::default() };

    let normal = EngineOptions::from_config(&cfg);
    assert_eq!(normal.page_size, 100);
    assert_eq!(normal.collection_policy, DispatchPolicy::Concurrent { limit: None });
    assert_eq!(normal.import_policy, DispatchPolicy::SerialDelayed { delay: Duration::from_millis(250) });

    let legacy = EngineOptions::legacy(&cfg);
    assert_eq!(legacy.page_size, 20);
    assert_eq!(legacy.collection_policy, DispatchPolicy::SerialDelayed { delay: Duration::from_secs(2) });
    assert_eq!(legacy.import_policy, normal.import_policy);
    assert_eq!(legacy.base_url, "http://localhost:1");
}

#[test]
fn zero_page_size_is_rejected() {
    let td = tempdir().unwrap();
    let path = td.path().join("config.toml");
    fs::write(&path, "base_url = \"https://bandcamp.com\"\npage_size = 0\n").unwrap();
    let err = Config::from_path(&path).unwrap_err();
    assert!(err.to_string().contains("page sizes"));
}

#[test]
fn bad_base_url_is_rejected() {
    let cfg = Config { base_url: "not a url".into(), ..Config::default() };
    assert!(cfg.validate().is_err());

    let cfg = Config { base_url: "https://bandcamp.com".into(), max_retained_errors: Some(0), ..Config::default() };
    assert!(cfg.validate().is_err());
}

#[test]
fn missing_file_is_an_error() {
    let td = tempdir().unwrap();
    assert!(Config::from_path(&td.path().join("absent.toml")).is_err());
}
