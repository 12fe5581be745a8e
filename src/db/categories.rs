use super::{Database, instant_at, millis, new_id, stamp};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

pub const DEFAULT_CATEGORY_COLOR: &str = "#6366f1";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<Option<String>>,
}

const CATEGORY_COLUMNS: &str = "id, name, color, icon, created_at, updated_at";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    category_at(row, 0)
}

/// Reads a category whose columns start at `base`, in `CATEGORY_COLUMNS` order.
pub(super) fn category_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(base)?,
        name: row.get(base + 1)?,
        color: row.get(base + 2)?,
        icon: row.get(base + 3)?,
        created_at: instant_at(row, base + 4)?,
        updated_at: instant_at(row, base + 5)?,
    })
}

impl Database {
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC"
        ))?;

        let rows = statement
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list categories")?;

        Ok(rows)
    }

    pub fn get_category(&self, id: &str) -> Result<Option<Category>> {
        self.conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                params![id],
                category_from_row,
            )
            .optional()
            .context("Failed to query category")
    }

    pub fn create_category(&self, input: &NewCategory, now: DateTime<Utc>) -> Result<Category> {
        let now = stamp(now);
        let category = Category {
            id: new_id(),
            name: input.name.trim().to_string(),
            color: input
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            icon: input.icon.clone(),
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                "INSERT INTO categories (id, name, color, icon, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &category.id,
                    &category.name,
                    &category.color,
                    &category.icon,
                    millis(now),
                    millis(now)
                ],
            )
            .with_context(|| format!("Failed to insert category: {}", category.name))?;

        Ok(category)
    }

    pub fn update_category(
        &self,
        id: &str,
        update: &CategoryUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Category>> {
        let Some(mut category) = self.get_category(id)? else {
            return Ok(None);
        };
        let now = stamp(now);

        if let Some(name) = &update.name {
            category.name = name.trim().to_string();
        }
        if let Some(color) = &update.color {
            category.color = color.clone();
        }
        if let Some(icon) = &update.icon {
            category.icon = icon.clone();
        }
        category.updated_at = now;

        self.conn
            .execute(
                "UPDATE categories SET name = ?2, color = ?3, icon = ?4, updated_at = ?5 WHERE id = ?1",
                params![
                    &category.id,
                    &category.name,
                    &category.color,
                    &category.icon,
                    millis(now)
                ],
            )
            .context("Failed to update category")?;

        Ok(Some(category))
    }

    pub fn delete_category(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id])
            .context("Failed to delete category")?;

        Ok(deleted > 0)
    }
}
