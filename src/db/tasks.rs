use super::categories::{Category, category_at};
use super::{Database, instant_at, millis, new_id, optional_instant_at, stamp};
use crate::calendar::DayClock;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("Unknown priority: {other}. Expected low|medium|high")),
        }
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub is_completed: bool,
    pub priority: Priority,
    pub category_id: Option<String>,
    pub category: Option<Category>,
    pub date: DateTime<Utc>,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub priority: Priority,
    pub category_id: Option<String>,
    pub date: DateTime<Utc>,
}

/// Partial update. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_time: Option<Option<DateTime<Utc>>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub duration: Option<Option<i64>>,
    pub is_completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category_id: Option<Option<String>>,
    pub date: Option<DateTime<Utc>>,
    pub order: Option<i64>,
}

impl TaskUpdate {
    fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(start_time) = self.start_time {
            task.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            task.end_time = end_time;
        }
        if let Some(duration) = self.duration {
            task.duration = duration;
        }
        if let Some(is_completed) = self.is_completed {
            task.is_completed = is_completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category_id) = &self.category_id {
            task.category_id = category_id.clone();
        }
        if let Some(date) = self.date {
            task.date = date;
        }
        if let Some(order) = self.order {
            task.order = order;
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskChange {
    pub was_completed: bool,
    pub task: Task,
}

impl TaskChange {
    pub fn just_completed(&self) -> bool {
        !self.was_completed && self.task.is_completed
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateMigration {
    pub id: String,
    pub title: String,
    pub original_date: DateTime<Utc>,
    pub corrected_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub needs_update: bool,
}

const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.start_time, t.end_time, t.duration,
        t.is_completed, t.priority, t.category_id, t.date, t.sort_order, t.created_at, t.updated_at,
        c.id, c.name, c.color, c.icon, c.created_at, c.updated_at
 FROM tasks t
 LEFT JOIN categories c ON c.id = t.category_id";

const TASK_ORDER: &str = "ORDER BY t.start_time IS NULL, t.start_time ASC, t.sort_order ASC";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let joined_category: Option<String> = row.get(13)?;
    let category = joined_category
        .map(|_| category_at(row, 13))
        .transpose()?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_time: optional_instant_at(row, 3)?,
        end_time: optional_instant_at(row, 4)?,
        duration: row.get(5)?,
        is_completed: row.get(6)?,
        priority: row.get(7)?,
        category_id: row.get(8)?,
        category,
        date: instant_at(row, 9)?,
        order: row.get(10)?,
        created_at: instant_at(row, 11)?,
        updated_at: instant_at(row, 12)?,
    })
}

impl Database {
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut statement = self.conn.prepare(&format!("{TASK_SELECT} {TASK_ORDER}"))?;

        let rows = statement
            .query_map([], task_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list tasks")?;

        Ok(rows)
    }

    /// Tasks whose `date` falls inside the inclusive range.
    pub fn tasks_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Task>> {
        let mut statement = self.conn.prepare(&format!(
            "{TASK_SELECT} WHERE t.date >= ?1 AND t.date <= ?2 {TASK_ORDER}"
        ))?;

        let rows = statement
            .query_map(params![millis(from), millis(to)], task_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query tasks")?;

        Ok(rows)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.conn
            .query_row(
                &format!("{TASK_SELECT} WHERE t.id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()
            .context("Failed to query task")
    }

    /// Inserts the task at the end of its local day.
    pub fn create_task(
        &mut self,
        input: &NewTask,
        clock: &DayClock,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let now = stamp(now);
        let id = new_id();
        let (day_start, day_end) = clock.bounds(clock.local_day_of(input.date));

        let transaction = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start transaction")?;

        let max_order: Option<i64> = transaction
            .query_row(
                "SELECT MAX(sort_order) FROM tasks WHERE date >= ?1 AND date <= ?2",
                params![millis(day_start), millis(day_end)],
                |row| row.get(0),
            )
            .context("Failed to read task order")?;

        transaction
            .execute(
                "INSERT INTO tasks (id, title, description, start_time, end_time, duration, is_completed, priority, category_id, date, sort_order, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    &id,
                    input.title.trim(),
                    &input.description,
                    input.start_time.map(millis),
                    input.end_time.map(millis),
                    input.duration,
                    input.priority,
                    &input.category_id,
                    millis(input.date),
                    max_order.map_or(0, |order| order + 1),
                    millis(now),
                ],
            )
            .context("Failed to insert task")?;

        transaction.commit().context("Failed to commit task")?;

        self.get_task(&id)?
            .context("Inserted task could not be read back")
    }

    pub fn update_task(
        &mut self,
        id: &str,
        update: &TaskUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<TaskChange>> {
        let transaction = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start transaction")?;

        let existing = transaction
            .query_row(
                &format!("{TASK_SELECT} WHERE t.id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()
            .context("Failed to query task")?;

        let Some(mut task) = existing else {
            return Ok(None);
        };

        let was_completed = task.is_completed;
        update.apply_to(&mut task);

        transaction
            .execute(
                "UPDATE tasks SET title = ?2, description = ?3, start_time = ?4, end_time = ?5, duration = ?6,
                        is_completed = ?7, priority = ?8, category_id = ?9, date = ?10, sort_order = ?11, updated_at = ?12
                 WHERE id = ?1",
                params![
                    &task.id,
                    &task.title,
                    &task.description,
                    task.start_time.map(millis),
                    task.end_time.map(millis),
                    task.duration,
                    task.is_completed,
                    task.priority,
                    &task.category_id,
                    millis(task.date),
                    task.order,
                    millis(stamp(now)),
                ],
            )
            .context("Failed to update task")?;

        transaction.commit().context("Failed to commit task update")?;

        let task = self
            .get_task(id)?
            .context("Updated task could not be read back")?;

        Ok(Some(TaskChange {
            was_completed,
            task,
        }))
    }

    pub fn delete_task(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .context("Failed to delete task")?;

        Ok(deleted > 0)
    }

    /// Each task's date should be the canonical instant of the local day it
    /// was created on.
    pub fn preview_date_migration(&self, clock: &DayClock) -> Result<Vec<DateMigration>> {
        date_migrations(&self.conn, clock)
    }

    pub fn apply_date_migration(
        &mut self,
        clock: &DayClock,
        now: DateTime<Utc>,
    ) -> Result<Vec<DateMigration>> {
        let transaction = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start transaction")?;

        let pending = date_migrations(&transaction, clock)?
            .into_iter()
            .filter(|migration| migration.needs_update)
            .collect::<Vec<_>>();

        pending.iter().try_for_each(|migration| {
            transaction
                .execute(
                    "UPDATE tasks SET date = ?2, updated_at = ?3 WHERE id = ?1",
                    params![
                        &migration.id,
                        millis(migration.corrected_date),
                        millis(stamp(now))
                    ],
                )
                .with_context(|| format!("Failed to migrate task date: {}", migration.id))
                .map(|_| ())
        })?;

        transaction
            .commit()
            .context("Failed to commit task date migration")?;

        Ok(pending)
    }
}

fn date_migrations(conn: &Connection, clock: &DayClock) -> Result<Vec<DateMigration>> {
    let mut statement =
        conn.prepare("SELECT id, title, date, created_at FROM tasks ORDER BY created_at ASC")?;

    let rows = statement
        .query_map([], |row| {
            let original_date = instant_at(row, 2)?;
            let created_at = instant_at(row, 3)?;
            let corrected_date = clock.storage_instant(clock.local_day_of(created_at));

            Ok(DateMigration {
                id: row.get(0)?,
                title: row.get(1)?,
                original_date,
                corrected_date,
                created_at,
                needs_update: original_date != corrected_date,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to preview task date migration")?;

    Ok(rows)
}
