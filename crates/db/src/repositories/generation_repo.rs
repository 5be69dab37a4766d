//! Repository for the `generations` table.
//!
//! Terminal transitions (`complete`, `fail`) are conditional on the row
//! still being `processing`, so each record moves to a terminal state at
//! most once.

use genhub_core::types::DbId;
use sqlx::PgPool;

use crate::models::generation::{
    CompleteGeneration, CreateGeneration, Generation, GenerationListQuery, GenerationPage,
};
use crate::models::status::{GenerationStatus, StatusId};

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, generation_kind, prompt, negative_prompt, parameters, status_id, \
    output_path, output_url, seed, error_message, favorite, notes, \
    created_at, completed_at, processing_time";

/// Maximum page size for history listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for history listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides persistence for generation job records.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new record in `processing` and return the full row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateGeneration,
    ) -> Result<Generation, sqlx::Error> {
        let query = format!(
            "INSERT INTO generations (generation_kind, prompt, negative_prompt, parameters, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(input.generation_kind.as_str())
            .bind(&input.prompt)
            .bind(&input.negative_prompt)
            .bind(&input.parameters)
            .bind(GenerationStatus::Processing.id())
            .fetch_one(pool)
            .await
    }

    /// Move a `processing` record to `completed` with its output fields.
    ///
    /// Returns `false` if the record does not exist or is already terminal.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        output: &CompleteGeneration,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, output_path = $3, output_url = $4, seed = $5, \
                 processing_time = $6, completed_at = NOW() \
             WHERE id = $1 AND status_id = $7",
        )
        .bind(id)
        .bind(GenerationStatus::Completed.id())
        .bind(&output.output_path)
        .bind(&output.output_url)
        .bind(output.seed)
        .bind(output.processing_time)
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a `processing` record to `failed` with the error text.
    ///
    /// Returns `false` if the record does not exist or is already terminal.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error: &str,
        processing_time: Option<f64>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, error_message = $3, processing_time = $4, \
                 completed_at = NOW() \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.id())
        .bind(error)
        .bind(processing_time)
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a record by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete a record. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM generations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Filtered, paginated history, newest first, with the total match count.
    ///
    /// Callers validate `params` first; an unknown status name is treated
    /// as no status filter here.
    pub async fn list(
        pool: &PgPool,
        params: &GenerationListQuery,
    ) -> Result<GenerationPage, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let status_id: Option<StatusId> = params
            .status
            .as_deref()
            .and_then(|s| s.parse::<GenerationStatus>().ok())
            .map(GenerationStatus::id);
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.generation_kind.is_some() {
            conditions.push(format!("generation_kind = ${bind_idx}"));
            bind_idx += 1;
        }
        if status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.favorite.is_some() {
            conditions.push(format!("favorite = ${bind_idx}"));
            bind_idx += 1;
        }
        if search.is_some() {
            conditions.push(format!(
                "(prompt ILIKE ${bind_idx} OR negative_prompt ILIKE ${bind_idx})"
            ));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM generations {where_clause}");
        let list_query = format!(
            "SELECT {COLUMNS} FROM generations \
             {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut count_q = sqlx::query_scalar::<_, i64>(&count_query);
        let mut list_q = sqlx::query_as::<_, Generation>(&list_query);

        if let Some(kind) = &params.generation_kind {
            count_q = count_q.bind(kind);
            list_q = list_q.bind(kind);
        }
        if let Some(sid) = status_id {
            count_q = count_q.bind(sid);
            list_q = list_q.bind(sid);
        }
        if let Some(fav) = params.favorite {
            count_q = count_q.bind(fav);
            list_q = list_q.bind(fav);
        }
        if let Some(pattern) = &search {
            count_q = count_q.bind(pattern);
            list_q = list_q.bind(pattern);
        }

        let total = count_q.fetch_one(pool).await?;
        let items = list_q.bind(limit).bind(offset).fetch_all(pool).await?;

        Ok(GenerationPage { items, total })
    }
}
