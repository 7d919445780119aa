use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::StoreError;

/// User-authored note, independent of generated content. Shares only the
/// free-text tag vocabulary with history records.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub tag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNote {
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub tag: String,
}

/// Merge-update: unset fields keep their stored value; `updated_at` always
/// bumps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNote {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tag: Option<String>,
}

const SELECT_COLUMNS: &str = "id, owner_id, title, content, tag, created_at, updated_at";

impl Note {
    pub async fn find_all_for_owner(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {SELECT_COLUMNS} FROM notes
             WHERE owner_id = $1
             ORDER BY updated_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await?;
        Ok(notes)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {SELECT_COLUMNS} FROM notes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(note)
    }

    pub async fn create(pool: &SqlitePool, data: &CreateNote, id: Uuid) -> Result<Self, StoreError> {
        let now = Utc::now();
        let note = sqlx::query_as::<_, Note>(
            r#"INSERT INTO notes (id, owner_id, title, content, tag, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, owner_id, title, content, tag, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.owner_id)
        .bind(&data.title)
        .bind(&data.content)
        .bind(&data.tag)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;
        Ok(note)
    }

    pub async fn update(
        pool: &SqlitePool,
        owner_id: Uuid,
        id: Uuid,
        data: &UpdateNote,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .filter(|note| note.owner_id == owner_id)
            .ok_or(sqlx::Error::RowNotFound)?;

        let title = data.title.clone().unwrap_or(existing.title);
        let content = data.content.clone().unwrap_or(existing.content);
        let tag = data.tag.clone().unwrap_or(existing.tag);

        let note = sqlx::query_as::<_, Note>(
            r#"UPDATE notes
               SET title = $2, content = $3, tag = $4, updated_at = $5
               WHERE id = $1
               RETURNING id, owner_id, title, content, tag, created_at, updated_at"#,
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(tag)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
        Ok(note)
    }

    pub async fn delete(pool: &SqlitePool, owner_id: Uuid, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
