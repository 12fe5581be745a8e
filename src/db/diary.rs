use super::{Database, instant_at, millis, new_id, stamp};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MOOD_SCORE_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Calm,
    Neutral,
    Sad,
    Anxious,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Calm => "calm",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
            Self::Anxious => "anxious",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "happy" => Ok(Self::Happy),
            "calm" => Ok(Self::Calm),
            "neutral" => Ok(Self::Neutral),
            "sad" => Ok(Self::Sad),
            "anxious" => Ok(Self::Anxious),
            other => Err(format!(
                "Unknown mood: {other}. Expected happy|calm|neutral|sad|anxious"
            )),
        }
    }
}

impl ToSql for Mood {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Mood {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub mood: Option<Mood>,
    pub mood_score: Option<i64>,
    pub prompt: Option<String>,
    pub weather: Option<String>,
    pub location: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDiaryEntry {
    pub title: Option<String>,
    pub content: String,
    pub mood: Option<Mood>,
    pub mood_score: Option<i64>,
    pub prompt: Option<String>,
    pub weather: Option<String>,
    pub location: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DiaryEntryUpdate {
    pub title: Option<Option<String>>,
    pub content: Option<String>,
    pub mood: Option<Option<Mood>>,
    pub mood_score: Option<Option<i64>>,
    pub weather: Option<Option<String>>,
    pub location: Option<Option<String>>,
}

const DIARY_COLUMNS: &str =
    "id, title, content, mood, mood_score, prompt, weather, location, date, created_at, updated_at";

fn diary_entry_from_row(row: &Row<'_>) -> rusqlite::Result<DiaryEntry> {
    Ok(DiaryEntry {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        mood: row.get(3)?,
        mood_score: row.get(4)?,
        prompt: row.get(5)?,
        weather: row.get(6)?,
        location: row.get(7)?,
        date: instant_at(row, 8)?,
        created_at: instant_at(row, 9)?,
        updated_at: instant_at(row, 10)?,
    })
}

impl Database {
    /// Newest first. `range` is an inclusive `[from, to]` filter on `date`.
    pub fn list_diary_entries(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        limit: Option<usize>,
    ) -> Result<Vec<DiaryEntry>> {
        let (from, to) = range
            .map(|(from, to)| (millis(from), millis(to)))
            .unwrap_or((i64::MIN, i64::MAX));
        let limit = limit.map_or(-1, |value| value as i64);

        let mut statement = self.conn.prepare(&format!(
            "SELECT {DIARY_COLUMNS}
             FROM diary_entries
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date DESC, created_at DESC
             LIMIT ?3"
        ))?;

        let rows = statement
            .query_map(params![from, to, limit], diary_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query diary entries")?;

        Ok(rows)
    }

    /// Entry dates inside the inclusive range, oldest first.
    pub fn diary_dates_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let mut statement = self.conn.prepare(
            "SELECT date FROM diary_entries WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC",
        )?;

        let rows = statement
            .query_map(params![millis(from), millis(to)], |row| instant_at(row, 0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query diary dates")?;

        Ok(rows)
    }

    pub fn get_diary_entry(&self, id: &str) -> Result<Option<DiaryEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {DIARY_COLUMNS} FROM diary_entries WHERE id = ?1"),
                params![id],
                diary_entry_from_row,
            )
            .optional()
            .context("Failed to query diary entry")
    }

    pub fn create_diary_entry(
        &self,
        input: &NewDiaryEntry,
        now: DateTime<Utc>,
    ) -> Result<DiaryEntry> {
        let now = stamp(now);
        let entry = DiaryEntry {
            id: new_id(),
            title: input.title.clone(),
            content: input.content.clone(),
            mood: input.mood,
            mood_score: input.mood_score,
            prompt: input.prompt.clone(),
            weather: input.weather.clone(),
            location: input.location.clone(),
            date: stamp(input.date),
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                &format!(
                    "INSERT INTO diary_entries ({DIARY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    &entry.id,
                    &entry.title,
                    &entry.content,
                    entry.mood,
                    entry.mood_score,
                    &entry.prompt,
                    &entry.weather,
                    &entry.location,
                    millis(entry.date),
                    millis(now),
                    millis(now),
                ],
            )
            .context("Failed to insert diary entry")?;

        Ok(entry)
    }

    pub fn update_diary_entry(
        &self,
        id: &str,
        update: &DiaryEntryUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<DiaryEntry>> {
        let Some(mut entry) = self.get_diary_entry(id)? else {
            return Ok(None);
        };

        if let Some(title) = &update.title {
            entry.title = title.clone();
        }
        if let Some(content) = &update.content {
            entry.content = content.clone();
        }
        if let Some(mood) = update.mood {
            entry.mood = mood;
        }
        if let Some(mood_score) = update.mood_score {
            entry.mood_score = mood_score;
        }
        if let Some(weather) = &update.weather {
            entry.weather = weather.clone();
        }
        if let Some(location) = &update.location {
            entry.location = location.clone();
        }
        entry.updated_at = stamp(now);

        self.conn
            .execute(
                "UPDATE diary_entries
                 SET title = ?2, content = ?3, mood = ?4, mood_score = ?5, weather = ?6, location = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    &entry.id,
                    &entry.title,
                    &entry.content,
                    entry.mood,
                    entry.mood_score,
                    &entry.weather,
                    &entry.location,
                    millis(entry.updated_at),
                ],
            )
            .context("Failed to update diary entry")?;

        Ok(Some(entry))
    }

    pub fn delete_diary_entry(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM diary_entries WHERE id = ?1", params![id])
            .context("Failed to delete diary entry")?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{DiaryEntryUpdate, Mood, NewDiaryEntry};
    use crate::calendar::DayClock;
    use crate::db::test_support::temp_database;
    use chrono::{DateTime, Duration, Utc};

    fn instant(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    fn entry(content: &str, date: DateTime<Utc>) -> NewDiaryEntry {
        NewDiaryEntry {
            title: None,
            content: content.to_string(),
            mood: Some(Mood::Calm),
            mood_score: Some(7),
            prompt: None,
            weather: None,
            location: None,
            date,
        }
    }

    #[test]
    fn mood_round_trips_through_storage() {
        let (_dir, database) = temp_database();
        let created = database
            .create_diary_entry(&entry("quiet morning", Utc::now()), Utc::now())
            .expect("create");

        let loaded = database
            .get_diary_entry(&created.id)
            .expect("get")
            .expect("exists");
        assert_eq!(loaded, created);
        assert_eq!(loaded.mood, Some(Mood::Calm));
        assert!("furious".parse::<Mood>().is_err());
    }

    #[test]
    fn list_filters_by_local_day_newest_first_with_limit() {
        let (_dir, database) = temp_database();
        let clock = DayClock::new(330).expect("valid offset");
        let now = Utc::now();
        // Both are 2024-01-02 locally; the third is 2024-01-01 local evening.
        let early = instant("2024-01-01T19:00:00Z");
        let later = instant("2024-01-02T10:00:00Z");
        let previous_day = instant("2024-01-01T18:00:00Z");

        for (content, date) in [("early", early), ("later", later), ("previous", previous_day)] {
            database
                .create_diary_entry(&entry(content, date), now)
                .expect("create");
        }

        let day = clock.parse_day("2024-01-02").expect("day");
        let contents = database
            .list_diary_entries(Some(clock.bounds(day)), None)
            .expect("list")
            .into_iter()
            .map(|entry| entry.content)
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["later", "early"]);

        let limited = database.list_diary_entries(None, Some(1)).expect("list");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].content, "later");
        assert_eq!(database.list_diary_entries(None, None).expect("list").len(), 3);
    }

    #[test]
    fn update_applies_only_given_fields() {
        let (_dir, database) = temp_database();
        let now = Utc::now();
        let created = database
            .create_diary_entry(&entry("draft", now), now)
            .expect("create");

        let update = DiaryEntryUpdate {
            content: Some("final".to_string()),
            mood: Some(None),
            ..DiaryEntryUpdate::default()
        };
        let updated = database
            .update_diary_entry(&created.id, &update, now + Duration::minutes(5))
            .expect("update")
            .expect("exists");

        assert_eq!(updated.content, "final");
        assert_eq!(updated.mood, None);
        assert_eq!(updated.mood_score, Some(7));
        assert!(updated.updated_at > created.updated_at);

        assert!(database.delete_diary_entry(&created.id).expect("delete"));
        assert!(database.get_diary_entry(&created.id).expect("get").is_none());
    }
}
