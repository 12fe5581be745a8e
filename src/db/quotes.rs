use super::{Database, instant_at, millis, new_id, stamp};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MotivationalQuote {
    pub id: String,
    pub content: String,
    pub author: Option<String>,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuote {
    pub content: String,
    pub author: Option<String>,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Default)]
pub struct QuoteUpdate {
    pub content: Option<String>,
    pub author: Option<Option<String>>,
    pub is_favorite: Option<bool>,
}

const QUOTE_COLUMNS: &str = "id, content, author, is_favorite, created_at, updated_at";

fn quote_from_row(row: &Row<'_>) -> rusqlite::Result<MotivationalQuote> {
    Ok(MotivationalQuote {
        id: row.get(0)?,
        content: row.get(1)?,
        author: row.get(2)?,
        is_favorite: row.get(3)?,
        created_at: instant_at(row, 4)?,
        updated_at: instant_at(row, 5)?,
    })
}

impl Database {
    pub fn list_quotes(&self) -> Result<Vec<MotivationalQuote>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = statement
            .query_map([], quote_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list quotes")?;

        Ok(rows)
    }

    pub fn random_quote(&self) -> Result<Option<MotivationalQuote>> {
        self.conn
            .query_row(
                &format!("SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY RANDOM() LIMIT 1"),
                [],
                quote_from_row,
            )
            .optional()
            .context("Failed to pick a random quote")
    }

    pub fn get_quote(&self, id: &str) -> Result<Option<MotivationalQuote>> {
        self.conn
            .query_row(
                &format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?1"),
                params![id],
                quote_from_row,
            )
            .optional()
            .context("Failed to query quote")
    }

    pub fn create_quote(&self, input: &NewQuote, now: DateTime<Utc>) -> Result<MotivationalQuote> {
        let now = stamp(now);
        let quote = MotivationalQuote {
            id: new_id(),
            content: input.content.clone(),
            author: input.author.clone(),
            is_favorite: input.is_favorite,
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                &format!("INSERT INTO quotes ({QUOTE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    &quote.id,
                    &quote.content,
                    &quote.author,
                    quote.is_favorite,
                    millis(now),
                    millis(now)
                ],
            )
            .context("Failed to insert quote")?;

        Ok(quote)
    }

    pub fn update_quote(
        &self,
        id: &str,
        update: &QuoteUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<MotivationalQuote>> {
        let Some(mut quote) = self.get_quote(id)? else {
            return Ok(None);
        };

        if let Some(content) = &update.content {
            quote.content = content.clone();
        }
        if let Some(author) = &update.author {
            quote.author = author.clone();
        }
        if let Some(is_favorite) = update.is_favorite {
            quote.is_favorite = is_favorite;
        }
        quote.updated_at = stamp(now);

        self.conn
            .execute(
                "UPDATE quotes SET content = ?2, author = ?3, is_favorite = ?4, updated_at = ?5 WHERE id = ?1",
                params![
                    &quote.id,
                    &quote.content,
                    &quote.author,
                    quote.is_favorite,
                    millis(quote.updated_at)
                ],
            )
            .context("Failed to update quote")?;

        Ok(Some(quote))
    }

    pub fn delete_quote(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM quotes WHERE id = ?1", params![id])
            .context("Failed to delete quote")?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{NewQuote, QuoteUpdate};
    use crate::db::test_support::temp_database;
    use chrono::{Duration, Utc};

    fn quote(content: &str) -> NewQuote {
        NewQuote {
            content: content.to_string(),
            author: Some("Seneca".to_string()),
            is_favorite: false,
        }
    }

    #[test]
    fn random_quote_is_none_when_empty() {
        let (_dir, database) = temp_database();
        assert!(database.random_quote().expect("random").is_none());

        let stored = database
            .create_quote(&quote("Luck is what happens when preparation meets opportunity."), Utc::now())
            .expect("create");
        assert_eq!(database.random_quote().expect("random"), Some(stored));
    }

    #[test]
    fn list_is_newest_first_and_updates_apply() {
        let (_dir, database) = temp_database();
        let now = Utc::now();
        let older = database.create_quote(&quote("older"), now).expect("create");
        database
            .create_quote(&quote("newer"), now + Duration::seconds(1))
            .expect("create");

        let contents = database
            .list_quotes()
            .expect("list")
            .into_iter()
            .map(|quote| quote.content)
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["newer", "older"]);

        let update = QuoteUpdate {
            author: Some(None),
            is_favorite: Some(true),
            ..QuoteUpdate::default()
        };
        let updated = database
            .update_quote(&older.id, &update, now)
            .expect("update")
            .expect("exists");
        assert!(updated.is_favorite);
        assert_eq!(updated.author, None);
        assert!(database.update_quote("missing", &update, now).expect("update").is_none());
    }
}
