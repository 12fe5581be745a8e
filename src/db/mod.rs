pub mod categories;
pub mod diary;
pub mod prompts;
pub mod queries;
pub mod quotes;
pub mod streaks;
pub mod tasks;

pub use categories::{Category, CategoryUpdate, NewCategory};
pub use diary::{DiaryEntry, DiaryEntryUpdate, Mood, NewDiaryEntry};
pub use prompts::DailyPrompt;
pub use quotes::{MotivationalQuote, NewQuote, QuoteUpdate};
pub use streaks::{StreakRecord, StreakUpdate};
pub use tasks::{DateMigration, NewTask, Priority, Task, TaskUpdate};

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, Row};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCounts {
    pub tasks: u64,
    pub categories: u64,
    pub diary_entries: u64,
    pub streaks: u64,
    pub prompts: u64,
    pub quotes: u64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set SQLite busy timeout")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn table_counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            tasks: self.count_rows("tasks")?,
            categories: self.count_rows("categories")?,
            diary_entries: self.count_rows("diary_entries")?,
            streaks: self.count_rows("streaks")?,
            prompts: self.count_rows("daily_prompts")?,
            quotes: self.count_rows("quotes")?,
        })
    }

    fn count_rows(&self, table: &'static str) -> Result<u64> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count.max(0) as u64)
            .with_context(|| format!("Failed to count rows in {table}"))
    }
}

/// True when `error` was caused by a `UNIQUE` constraint failure.
pub fn is_unique_violation(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    })
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Drops sub-millisecond precision so returned values match what is stored.
pub(crate) fn stamp(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

pub(crate) fn millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn instant_at(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: i64 = row.get(index)?;
    DateTime::from_timestamp_millis(raw)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, raw))
}

pub(crate) fn optional_instant_at(
    row: &Row<'_>,
    index: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<i64> = row.get(index)?;
    raw.map(|value| {
        DateTime::from_timestamp_millis(value)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, value))
    })
    .transpose()
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_database;
    use super::{Database, instant_at, millis};
    use chrono::{DateTime, Utc};

    #[test]
    fn open_creates_schema_idempotently() {
        let (dir, database) = temp_database();
        drop(database);

        let reopened = Database::open(&dir.path().join("diary.db")).expect("reopen");
        let counts = reopened.table_counts().expect("counts");
        assert_eq!(counts.tasks, 0);
        assert_eq!(counts.streaks, 0);
    }

    #[test]
    fn instants_round_trip_through_millis() {
        let (_dir, database) = temp_database();
        let at = DateTime::parse_from_rfc3339("2024-01-02T18:29:59.999Z")
            .expect("rfc3339")
            .with_timezone(&Utc);

        let read = database
            .conn
            .query_row("SELECT ?1", [millis(at)], |row| instant_at(row, 0))
            .expect("select");
        assert_eq!(read, at);
    }
}
