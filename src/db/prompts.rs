use super::{Database, instant_at, millis, new_id, stamp};
use crate::prompts::{DEFAULT_PROMPTS, pick_for_day};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{Row, TransactionBehavior, params};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPrompt {
    pub id: String,
    pub content: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn prompt_from_row(row: &Row<'_>) -> rusqlite::Result<DailyPrompt> {
    Ok(DailyPrompt {
        id: row.get(0)?,
        content: row.get(1)?,
        author: row.get(2)?,
        category: row.get(3)?,
        is_active: row.get(4)?,
        created_at: instant_at(row, 5)?,
    })
}

impl Database {
    /// Active prompts in insertion order.
    pub fn active_prompts(&self) -> Result<Vec<DailyPrompt>> {
        let mut statement = self.conn.prepare(
            "SELECT id, content, author, category, is_active, created_at
             FROM daily_prompts
             WHERE is_active = 1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = statement
            .query_map([], prompt_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list prompts")?;

        Ok(rows)
    }

    /// Seeds the default prompts when no active prompt exists. Returns the
    /// number of prompts inserted.
    pub fn seed_default_prompts(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let now = stamp(now);
        let transaction = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start transaction")?;

        let active: i64 = transaction
            .query_row(
                "SELECT COUNT(*) FROM daily_prompts WHERE is_active = 1",
                [],
                |row| row.get(0),
            )
            .context("Failed to count prompts")?;

        if active > 0 {
            return Ok(0);
        }

        // Millisecond spacing keeps `created_at` ordering equal to list order.
        DEFAULT_PROMPTS
            .iter()
            .enumerate()
            .try_for_each(|(index, prompt)| {
                let created_at = now + Duration::milliseconds(index as i64);
                transaction
                    .execute(
                        "INSERT INTO daily_prompts (id, content, category, is_active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
                        params![new_id(), prompt.content, prompt.category, millis(created_at)],
                    )
                    .context("Failed to seed prompt")
                    .map(|_| ())
            })?;

        transaction.commit().context("Failed to commit prompts")?;

        Ok(DEFAULT_PROMPTS.len())
    }

    /// The prompt of the day for `day`, seeding defaults first if needed.
    pub fn prompt_for_day(
        &mut self,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<DailyPrompt>> {
        let seeded = self.seed_default_prompts(now)?;
        if seeded > 0 {
            info!(count = seeded, "seeded default prompts");
        }

        let prompts = self.active_prompts()?;
        Ok(pick_for_day(day, &prompts).cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::temp_database;
    use crate::prompts::DEFAULT_PROMPTS;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn defaults_are_seeded_once() {
        let (_dir, mut database) = temp_database();

        assert_eq!(
            database.seed_default_prompts(Utc::now()).expect("seed"),
            DEFAULT_PROMPTS.len()
        );
        assert_eq!(database.seed_default_prompts(Utc::now()).expect("seed"), 0);

        let prompts = database.active_prompts().expect("list");
        assert_eq!(prompts.len(), DEFAULT_PROMPTS.len());
        assert_eq!(prompts[0].content, DEFAULT_PROMPTS[0].content);
        assert_eq!(prompts[9].content, DEFAULT_PROMPTS[9].content);
    }

    #[test]
    fn prompt_of_the_day_is_stable() {
        let (_dir, mut database) = temp_database();
        let day = NaiveDate::from_ymd_opt(2024, 3, 15).expect("date");

        let first = database
            .prompt_for_day(day, Utc::now())
            .expect("prompt")
            .expect("seeded");
        let second = database
            .prompt_for_day(day, Utc::now())
            .expect("prompt")
            .expect("seeded");

        assert_eq!(first, second);
        // 20240315 % 10 == 5
        assert_eq!(first.content, DEFAULT_PROMPTS[5].content);
    }
}
