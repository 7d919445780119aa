use std::sync::Arc;

use chrono::Utc;
use db::{
    DbService, StoreError,
    models::note::{CreateNote, Note, UpdateNote},
};
use thiserror::Error;
use utils::auth::AuthProvider;
use uuid::Uuid;

pub const DEFAULT_NOTE_TAG: &str = "general";

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("sign in to manage notes")]
    AuthRequired,
    #[error("note not found")]
    NotFound,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for NoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(sqlx::Error::RowNotFound) => NoteError::NotFound,
            other => NoteError::Store(other),
        }
    }
}

/// Notes CRUD, decoupled from generation. Notes are mutable in place,
/// unlike history records.
#[derive(Clone)]
pub struct NoteService {
    db: DbService,
    auth: Arc<dyn AuthProvider>,
}

impl NoteService {
    pub fn new(db: DbService, auth: Arc<dyn AuthProvider>) -> Self {
        Self { db, auth }
    }

    /// All of the owner's notes, most recently updated first.
    pub async fn list(&self) -> Result<Vec<Note>, NoteError> {
        let owner_id = self.require_user()?;
        Ok(Note::find_all_for_owner(&self.db.pool, owner_id).await?)
    }

    pub async fn create(
        &self,
        title: &str,
        content: &str,
        tag: Option<&str>,
    ) -> Result<Note, NoteError> {
        let owner_id = self.require_user()?;
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(NoteError::Validation(
                "title and content cannot be empty".to_string(),
            ));
        }

        let note = Note::create(
            &self.db.pool,
            &CreateNote {
                owner_id,
                title: title.to_string(),
                content: content.to_string(),
                tag: tag.unwrap_or(DEFAULT_NOTE_TAG).to_string(),
            },
            Uuid::new_v4(),
        )
        .await?;
        Ok(note)
    }

    /// Capture content from a generated view with a derived title.
    pub async fn create_quick(
        &self,
        content: &str,
        source_tag: &str,
        source_title: Option<&str>,
    ) -> Result<Note, NoteError> {
        let title = match source_title.map(str::trim).filter(|title| !title.is_empty()) {
            Some(source_title) => format!("{source_tag}: {source_title}"),
            None => format!("Quick Note - {}", Utc::now().format("%Y-%m-%d")),
        };
        self.create(&title, content, Some(source_tag)).await
    }

    /// Merge-update the note and bump its `updated_at`.
    pub async fn update(&self, id: Uuid, data: &UpdateNote) -> Result<Note, NoteError> {
        let owner_id = self.require_user()?;
        for field in [&data.title, &data.content] {
            if field.as_deref().is_some_and(|value| value.trim().is_empty()) {
                return Err(NoteError::Validation(
                    "title and content cannot be empty".to_string(),
                ));
            }
        }
        Ok(Note::update(&self.db.pool, owner_id, id, data).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), NoteError> {
        let owner_id = self.require_user()?;
        let rows = Note::delete(&self.db.pool, owner_id, id).await?;
        if rows == 0 {
            return Err(NoteError::NotFound);
        }
        Ok(())
    }

    fn require_user(&self) -> Result<Uuid, NoteError> {
        self.auth.current_user().ok_or(NoteError::AuthRequired)
    }
}
