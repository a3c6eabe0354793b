// Storage module: persistence for subscribed chats and composed reports.

mod sqlite;

use crate::config::StorageConfig;
use anyhow::{anyhow, Result};
use std::sync::Arc;

pub use sqlite::SqliteStorage;

/// A chat subscribed to the daily report. The name fields are display
/// metadata only, used for greetings and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub chat_id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SubscriberRecord {
    /// First name if present, last name otherwise.
    pub fn greeting_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| {
                self.last_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
            })
    }
}

/// One composed report, keyed by its ISO calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub date: String,
    pub text: String,
}

/// Storage backend abstraction over the subscriber and report tables.
pub trait StorageBackend: Send + Sync {
    fn ensure_initialized(&self) -> Result<()>;

    /// Keyed by chat id; re-subscribing overwrites the metadata.
    fn upsert_subscriber(&self, record: &SubscriberRecord) -> Result<()>;
    /// Deleting an absent id is a no-op.
    fn delete_subscriber(&self, chat_id: i64) -> Result<()>;
    fn list_subscribers(&self) -> Result<Vec<SubscriberRecord>>;

    /// Keyed by date; the daily crawl overwrites the same day's report.
    fn upsert_report(&self, date: &str, text: &str) -> Result<()>;
    /// Most recent report by date ordering, `None` when the store is empty.
    fn latest_report(&self) -> Result<Option<ReportRecord>>;
}

pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    for table in [&config.subscribers_table, &config.reports_table] {
        if !is_safe_table_name(table) {
            return Err(anyhow!("invalid table name: {table}"));
        }
    }
    Ok(Arc::new(SqliteStorage::new(
        config.db_path.trim().to_string(),
        config.subscribers_table.clone(),
        config.reports_table.clone(),
    )))
}

/// Table names come from configuration and are interpolated into DDL, so
/// only plain identifiers are accepted.
fn is_safe_table_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !name.chars().next().is_some_and(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_table_names() {
        assert!(is_safe_table_name("subscribed_chats"));
        assert!(is_safe_table_name("reports2"));
        assert!(!is_safe_table_name(""));
        assert!(!is_safe_table_name("2reports"));
        assert!(!is_safe_table_name("reports; DROP TABLE x"));
    }

    #[test]
    fn test_greeting_name_prefers_first_name() {
        let mut record = SubscriberRecord {
            chat_id: 1,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            ..Default::default()
        };
        assert_eq!(record.greeting_name(), Some("Ada"));

        record.first_name = Some("  ".to_string());
        assert_eq!(record.greeting_name(), Some("Lovelace"));

        record.last_name = None;
        assert_eq!(record.greeting_name(), None);
    }
}
