use chrono::{DateTime, Utc};
use genai::artifact::{Artifact, ArtifactKind};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::StoreError;

/// Durable record of a past artifact. Written once at generation success,
/// never mutated, destroyed only by explicit deletion.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: ArtifactKind,
    pub title: String,
    #[ts(type = "JsonValue")]
    pub payload: sqlx::types::Json<serde_json::Value>,
    pub score: Option<i64>,
    pub question_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Re-typed payload for rehydration and the detail drawer.
    pub fn artifact(&self) -> Result<Artifact, serde_json::Error> {
        Artifact::from_parts(self.kind, &self.payload.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHistoryRecord {
    pub owner_id: Uuid,
    pub kind: ArtifactKind,
    pub title: String,
    pub payload: serde_json::Value,
    pub score: Option<i64>,
    pub question_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum SortField {
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub const NEWEST_FIRST: Self = Self {
        field: SortField::CreatedAt,
        direction: SortDirection::Desc,
    };
    pub const TITLE_ASC: Self = Self {
        field: SortField::Title,
        direction: SortDirection::Asc,
    };
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::NEWEST_FIRST
    }
}

/// Opaque pointer to the last record of a loaded page. Valid only for the
/// exact filter, search, and sort combination that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCursor {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<&HistoryRecord> for PageCursor {
    fn from(record: &HistoryRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            created_at: record.created_at,
        }
    }
}

/// One page request against an owner's history collection.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub owner_id: Uuid,
    pub kind: Option<ArtifactKind>,
    /// Half-open lexical range on `title`, used for prefix scans.
    pub title_range: Option<(String, String)>,
    pub sort: SortSpec,
    pub limit: i64,
    pub start_after: Option<PageCursor>,
}

impl HistoryQuery {
    /// A range scan must order by the filtered field, otherwise the cursor
    /// cannot stay contiguous with the range.
    fn validate(&self) -> Result<(), StoreError> {
        if self.title_range.is_some() && self.sort.field != SortField::Title {
            return Err(StoreError::UnsupportedQuery(
                "a title range filter requires ordering by title".to_string(),
            ));
        }
        Ok(())
    }
}

const SELECT_COLUMNS: &str =
    "id, owner_id, kind, title, payload, score, question_count, created_at";

impl HistoryRecord {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateHistoryRecord,
        id: Uuid,
    ) -> Result<Self, StoreError> {
        // Timestamps are store-assigned so ordering stays consistent across
        // callers.
        let created_at = Utc::now();
        let record = sqlx::query_as::<_, HistoryRecord>(
            r#"INSERT INTO history_records
               (id, owner_id, kind, title, payload, score, question_count, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, owner_id, kind, title, payload, score, question_count, created_at"#,
        )
        .bind(id)
        .bind(data.owner_id)
        .bind(data.kind)
        .bind(&data.title)
        .bind(sqlx::types::Json(data.payload.clone()))
        .bind(data.score)
        .bind(data.question_count)
        .bind(created_at)
        .fetch_one(pool)
        .await?;
        Ok(record)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, StoreError> {
        let record = sqlx::query_as::<_, HistoryRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM history_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(record)
    }

    /// Fetch one page matching `query`, keyset-paginated after the cursor.
    /// Records tie-break on `id` so pages never skip or repeat rows.
    pub async fn find_page(
        pool: &SqlitePool,
        query: &HistoryQuery,
    ) -> Result<Vec<Self>, StoreError> {
        query.validate()?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {SELECT_COLUMNS} FROM history_records WHERE owner_id = "
        ));
        builder.push_bind(query.owner_id);

        if let Some(kind) = query.kind {
            builder.push(" AND kind = ");
            builder.push_bind(kind);
        }
        if let Some((lower, upper)) = &query.title_range {
            builder.push(" AND title >= ");
            builder.push_bind(lower.clone());
            builder.push(" AND title < ");
            builder.push_bind(upper.clone());
        }

        if let Some(cursor) = &query.start_after {
            let comparison = match query.sort.direction {
                SortDirection::Asc => " > ",
                SortDirection::Desc => " < ",
            };
            match query.sort.field {
                SortField::Title => {
                    builder.push(" AND (title, id)");
                    builder.push(comparison);
                    builder.push("(");
                    builder.push_bind(cursor.title.clone());
                    builder.push(", ");
                    builder.push_bind(cursor.id);
                    builder.push(")");
                }
                SortField::CreatedAt => {
                    builder.push(" AND (created_at, id)");
                    builder.push(comparison);
                    builder.push("(");
                    builder.push_bind(cursor.created_at);
                    builder.push(", ");
                    builder.push_bind(cursor.id);
                    builder.push(")");
                }
            }
        }

        let field = match query.sort.field {
            SortField::CreatedAt => "created_at",
            SortField::Title => "title",
        };
        let direction = match query.sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        builder.push(format!(" ORDER BY {field} {direction}, id {direction} LIMIT "));
        builder.push_bind(query.limit);

        let records = builder
            .build_query_as::<HistoryRecord>()
            .fetch_all(pool)
            .await?;
        Ok(records)
    }

    /// Every record for an owner, newest first. Used by clear-all, which
    /// ignores the active filter.
    pub async fn find_all_for_owner(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        let records = sqlx::query_as::<_, HistoryRecord>(&format!(
            "SELECT {SELECT_COLUMNS} FROM history_records
             WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await?;
        Ok(records)
    }

    pub async fn delete(pool: &SqlitePool, owner_id: Uuid, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM history_records WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// All-or-nothing batch delete.
    pub async fn delete_many(
        pool: &SqlitePool,
        owner_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM history_records WHERE id = $1 AND owner_id = $2")
                .bind(id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::DbService;

    async fn seed(pool: &SqlitePool, owner_id: Uuid, kind: ArtifactKind, title: &str) -> HistoryRecord {
        HistoryRecord::create(
            pool,
            &CreateHistoryRecord {
                owner_id,
                kind,
                title: title.to_string(),
                payload: json!({ "bodyText": title, "chatHistory": [] }),
                score: None,
                question_count: None,
            },
            Uuid::new_v4(),
        )
        .await
        .expect("seed record")
    }

    #[tokio::test]
    async fn create_and_read_back_round_trips() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();

        let created = HistoryRecord::create(
            &db.pool,
            &CreateHistoryRecord {
                owner_id: owner,
                kind: ArtifactKind::Quiz,
                title: "Photosynthesis".to_string(),
                payload: json!({ "quizTitle": "Photosynthesis", "questions": [] }),
                score: Some(4),
                question_count: Some(5),
            },
            Uuid::new_v4(),
        )
        .await
        .expect("create record");

        let fetched = HistoryRecord::find_by_id(&db.pool, created.id)
            .await
            .expect("query")
            .expect("record exists");
        assert_eq!(fetched.kind, ArtifactKind::Quiz);
        assert_eq!(fetched.title, "Photosynthesis");
        assert_eq!(fetched.score, Some(4));
        assert_eq!(fetched.payload.0["quizTitle"], "Photosynthesis");
    }

    #[tokio::test]
    async fn title_prefix_range_returns_contiguous_matches() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();
        for title in ["Phonetics", "Photosynthesis", "Biology", "Phobias"] {
            seed(&db.pool, owner, ArtifactKind::Explanation, title).await;
        }

        let page = HistoryRecord::find_page(
            &db.pool,
            &HistoryQuery {
                owner_id: owner,
                kind: None,
                title_range: Some(("Pho".to_string(), "Pho\u{f8ff}".to_string())),
                sort: SortSpec::TITLE_ASC,
                limit: 10,
                start_after: None,
            },
        )
        .await
        .expect("range query");

        let titles: Vec<&str> = page.iter().map(|record| record.title.as_str()).collect();
        assert_eq!(titles, vec!["Phobias", "Phonetics", "Photosynthesis"]);
    }

    #[tokio::test]
    async fn range_filter_with_mismatched_sort_is_rejected() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let err = HistoryRecord::find_page(
            &db.pool,
            &HistoryQuery {
                owner_id: Uuid::new_v4(),
                kind: None,
                title_range: Some(("a".to_string(), "a\u{f8ff}".to_string())),
                sort: SortSpec::NEWEST_FIRST,
                limit: 10,
                start_after: None,
            },
        )
        .await
        .expect_err("mismatched sort must be rejected");
        assert!(matches!(err, StoreError::UnsupportedQuery(_)));
    }

    #[tokio::test]
    async fn keyset_pagination_neither_skips_nor_repeats() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();
        for index in 0..7 {
            seed(
                &db.pool,
                owner,
                ArtifactKind::Flashcards,
                &format!("Deck {index}"),
            )
            .await;
        }

        let base = HistoryQuery {
            owner_id: owner,
            kind: None,
            title_range: None,
            sort: SortSpec::TITLE_ASC,
            limit: 3,
            start_after: None,
        };

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = HistoryRecord::find_page(
                &db.pool,
                &HistoryQuery {
                    start_after: cursor.clone(),
                    ..base.clone()
                },
            )
            .await
            .expect("page query");
            if page.is_empty() {
                break;
            }
            cursor = page.last().map(PageCursor::from);
            seen.extend(page.into_iter().map(|record| record.title));
        }

        let expected: Vec<String> = (0..7).map(|index| format!("Deck {index}")).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn kind_filter_restricts_results() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();
        seed(&db.pool, owner, ArtifactKind::Quiz, "Quiz A").await;
        seed(&db.pool, owner, ArtifactKind::Explanation, "Explainer").await;

        let page = HistoryRecord::find_page(
            &db.pool,
            &HistoryQuery {
                owner_id: owner,
                kind: Some(ArtifactKind::Quiz),
                title_range: None,
                sort: SortSpec::NEWEST_FIRST,
                limit: 10,
                start_after: None,
            },
        )
        .await
        .expect("filtered query");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].kind, ArtifactKind::Quiz);
    }

    #[tokio::test]
    async fn owner_scoping_hides_other_owners() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        seed(&db.pool, owner, ArtifactKind::Quiz, "Mine").await;
        seed(&db.pool, stranger, ArtifactKind::Quiz, "Theirs").await;

        let records = HistoryRecord::find_all_for_owner(&db.pool, owner)
            .await
            .expect("owner query");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Mine");
    }

    #[tokio::test]
    async fn delete_many_removes_exactly_the_given_ids() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();
        let keep = seed(&db.pool, owner, ArtifactKind::Quiz, "Keep").await;
        let drop_a = seed(&db.pool, owner, ArtifactKind::Quiz, "Drop A").await;
        let drop_b = seed(&db.pool, owner, ArtifactKind::Quiz, "Drop B").await;

        let deleted = HistoryRecord::delete_many(&db.pool, owner, &[drop_a.id, drop_b.id])
            .await
            .expect("batch delete");
        assert_eq!(deleted, 2);

        let remaining = HistoryRecord::find_all_for_owner(&db.pool, owner)
            .await
            .expect("owner query");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn delete_requires_matching_owner() {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();
        let record = seed(&db.pool, owner, ArtifactKind::MindMap, "Map").await;

        let rows = HistoryRecord::delete(&db.pool, Uuid::new_v4(), record.id)
            .await
            .expect("delete call");
        assert_eq!(rows, 0);
        assert!(
            HistoryRecord::find_by_id(&db.pool, record.id)
                .await
                .expect("query")
                .is_some()
        );
    }
}
