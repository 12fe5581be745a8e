use super::{Database, instant_at, millis, new_id, optional_instant_at, stamp};
use crate::calendar::DayClock;
use crate::streak::{self, StreakState, StreakTransition};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StreakRecord {
    pub fn state(&self) -> StreakState {
        StreakState {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_activity_at: self.last_activity_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub transition: StreakTransition,
    pub streak: StreakRecord,
}

const STREAK_COLUMNS: &str =
    "id, activity_type, current_streak, longest_streak, last_activity_at, created_at, updated_at";

fn streak_from_row(row: &Row<'_>) -> rusqlite::Result<StreakRecord> {
    Ok(StreakRecord {
        id: row.get(0)?,
        activity_type: row.get(1)?,
        current_streak: row.get(2)?,
        longest_streak: row.get(3)?,
        last_activity_at: optional_instant_at(row, 4)?,
        created_at: instant_at(row, 5)?,
        updated_at: instant_at(row, 6)?,
    })
}

fn find_streak(conn: &Connection, activity_type: &str) -> Result<Option<StreakRecord>> {
    conn.query_row(
        &format!("SELECT {STREAK_COLUMNS} FROM streaks WHERE activity_type = ?1"),
        params![activity_type],
        streak_from_row,
    )
    .optional()
    .with_context(|| format!("Failed to query streak: {activity_type}"))
}

impl Database {
    pub fn list_streaks(&self, activity_type: Option<&str>) -> Result<Vec<StreakRecord>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {STREAK_COLUMNS}
             FROM streaks
             WHERE ?1 IS NULL OR activity_type = ?1
             ORDER BY activity_type ASC"
        ))?;

        let rows = statement
            .query_map(params![activity_type], streak_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list streaks")?;

        Ok(rows)
    }

    pub fn get_streak(&self, activity_type: &str) -> Result<Option<StreakRecord>> {
        find_streak(&self.conn, activity_type)
    }

    /// Applies one qualifying event to the streak of `activity_type`.
    ///
    /// The read and the write share one `BEGIN IMMEDIATE` transaction, so the
    /// SQLite write lock is held from the read onward and concurrent updaters
    /// on other connections wait for the commit before reading.
    pub fn record_activity(
        &mut self,
        activity_type: &str,
        now: DateTime<Utc>,
        clock: &DayClock,
    ) -> Result<StreakUpdate> {
        let activity_type = activity_type.trim();
        if activity_type.is_empty() {
            bail!("Streak activity type must not be empty");
        }

        let now = stamp(now);
        let transaction = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start streak transaction")?;

        let prior = find_streak(&transaction, activity_type)?;
        let next = streak::advance(prior.as_ref().map(StreakRecord::state), now, clock);

        let record = match prior {
            Some(existing) if !next.transition.changes_state() => existing,
            Some(existing) => {
                transaction
                    .execute(
                        "UPDATE streaks
                         SET current_streak = ?2, longest_streak = ?3, last_activity_at = ?4, updated_at = ?5
                         WHERE id = ?1",
                        params![
                            &existing.id,
                            next.state.current_streak,
                            next.state.longest_streak,
                            next.state.last_activity_at.map(millis),
                            millis(now),
                        ],
                    )
                    .with_context(|| format!("Failed to update streak: {activity_type}"))?;

                StreakRecord {
                    current_streak: next.state.current_streak,
                    longest_streak: next.state.longest_streak,
                    last_activity_at: next.state.last_activity_at,
                    updated_at: now,
                    ..existing
                }
            }
            None => {
                let record = StreakRecord {
                    id: new_id(),
                    activity_type: activity_type.to_string(),
                    current_streak: next.state.current_streak,
                    longest_streak: next.state.longest_streak,
                    last_activity_at: next.state.last_activity_at,
                    created_at: now,
                    updated_at: now,
                };

                transaction
                    .execute(
                        &format!("INSERT INTO streaks ({STREAK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                        params![
                            &record.id,
                            &record.activity_type,
                            record.current_streak,
                            record.longest_streak,
                            record.last_activity_at.map(millis),
                            millis(now),
                            millis(now),
                        ],
                    )
                    .with_context(|| format!("Failed to create streak: {activity_type}"))?;

                record
            }
        };

        transaction
            .commit()
            .context("Failed to commit streak update")?;

        Ok(StreakUpdate {
            transition: next.transition,
            streak: record,
        })
    }
}
