// SQLite storage implementation for the subscriber and report tables.
use crate::storage::{ReportRecord, StorageBackend, SubscriberRecord};
use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SqliteStorage {
    db_path: PathBuf,
    subscribers_table: String,
    reports_table: String,
    initialized: AtomicBool,
    init_guard: Mutex<()>,
}

impl SqliteStorage {
    pub fn new(db_path: String, subscribers_table: String, reports_table: String) -> Self {
        let path = if db_path.trim().is_empty() {
            PathBuf::from("./data/corona-reporter.db")
        } else {
            PathBuf::from(db_path)
        };
        Self {
            db_path: path,
            subscribers_table,
            reports_table,
            initialized: AtomicBool::new(false),
            init_guard: Mutex::new(()),
        }
    }

    fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        self.ensure_db_dir()?;
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Ok(conn)
    }

    fn now_ts() -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

impl StorageBackend for SqliteStorage {
    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.init_guard.lock();
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.open()?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {subscribers} (
              id INTEGER PRIMARY KEY,
              title TEXT,
              username TEXT,
              first_name TEXT,
              last_name TEXT,
              updated_time REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {reports} (
              date TEXT PRIMARY KEY,
              report TEXT NOT NULL,
              updated_time REAL NOT NULL
            );
            "#,
            subscribers = self.subscribers_table,
            reports = self.reports_table,
        ))?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn upsert_subscriber(&self, record: &SubscriberRecord) -> Result<()> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        conn.execute(
            &format!(
                r#"
                INSERT INTO {table} (id, title, username, first_name, last_name, updated_time)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                  title = excluded.title,
                  username = excluded.username,
                  first_name = excluded.first_name,
                  last_name = excluded.last_name,
                  updated_time = excluded.updated_time
                "#,
                table = self.subscribers_table,
            ),
            params![
                record.chat_id,
                record.title,
                record.username,
                record.first_name,
                record.last_name,
                Self::now_ts(),
            ],
        )?;
        Ok(())
    }

    fn delete_subscriber(&self, chat_id: i64) -> Result<()> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", self.subscribers_table),
            params![chat_id],
        )?;
        Ok(())
    }

    fn list_subscribers(&self) -> Result<Vec<SubscriberRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, title, username, first_name, last_name FROM {} ORDER BY id",
            self.subscribers_table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(SubscriberRecord {
                chat_id: row.get(0)?,
                title: row.get(1)?,
                username: row.get(2)?,
                first_name: row.get(3)?,
                last_name: row.get(4)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn upsert_report(&self, date: &str, text: &str) -> Result<()> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        conn.execute(
            &format!(
                r#"
                INSERT INTO {table} (date, report, updated_time)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(date) DO UPDATE SET
                  report = excluded.report,
                  updated_time = excluded.updated_time
                "#,
                table = self.reports_table,
            ),
            params![date, text, Self::now_ts()],
        )?;
        Ok(())
    }

    fn latest_report(&self) -> Result<Option<ReportRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT date, report FROM {} ORDER BY date DESC LIMIT 1",
                    self.reports_table
                ),
                [],
                |row| {
                    Ok(ReportRecord {
                        date: row.get(0)?,
                        text: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
