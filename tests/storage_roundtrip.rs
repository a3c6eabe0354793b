use corona_reporter::config::StorageConfig;
use corona_reporter::storage::{build_storage, SubscriberRecord};

fn temp_config(dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig {
        db_path: dir.path().join("reporter.db").to_string_lossy().to_string(),
        subscribers_table: "subscribed_chats".to_string(),
        reports_table: "reports".to_string(),
    }
}

#[test]
fn subscribe_twice_keeps_one_record_with_latest_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let storage = build_storage(&temp_config(&dir)).unwrap();

    storage
        .upsert_subscriber(&SubscriberRecord {
            chat_id: 7,
            first_name: Some("Ada".to_string()),
            ..Default::default()
        })
        .unwrap();
    storage
        .upsert_subscriber(&SubscriberRecord {
            chat_id: 7,
            first_name: Some("Ada".to_string()),
            username: Some("ada".to_string()),
            ..Default::default()
        })
        .unwrap();

    let subscribers = storage.list_subscribers().unwrap();
    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0].username.as_deref(), Some("ada"));
}

#[test]
fn unsubscribe_unknown_chat_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let storage = build_storage(&temp_config(&dir)).unwrap();
    storage.delete_subscriber(12345).unwrap();
    assert!(storage.list_subscribers().unwrap().is_empty());
}

#[test]
fn latest_report_follows_date_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let storage = build_storage(&temp_config(&dir)).unwrap();

    assert!(storage.latest_report().unwrap().is_none());

    storage.upsert_report("2020-04-05", "a").unwrap();
    storage.upsert_report("2020-04-07", "c").unwrap();
    storage.upsert_report("2020-04-06", "b").unwrap();
    let latest = storage.latest_report().unwrap().unwrap();
    assert_eq!(latest.date, "2020-04-07");
    assert_eq!(latest.text, "c");
}

#[test]
fn rejects_unsafe_table_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = temp_config(&dir);
    config.reports_table = "reports; DROP TABLE x".to_string();
    assert!(build_storage(&config).is_err());
}
