//! Job record persistence seam.
//!
//! [`PgJobRecords`] delegates to [`GenerationRepo`]; [`MemoryJobRecords`]
//! keeps rows in process and backs tests and database-less runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use genhub_core::types::DbId;
use genhub_db::models::generation::{
    CompleteGeneration, CreateGeneration, Generation, GenerationListQuery, GenerationPage,
};
use genhub_db::models::status::GenerationStatus;
use genhub_db::repositories::GenerationRepo;
use genhub_db::DbPool;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable job record store.
///
/// `complete` and `fail` only apply to a record still in `processing` and
/// report whether they changed it.
#[async_trait]
pub trait JobRecords: Send + Sync {
    async fn create(&self, input: &CreateGeneration) -> Result<Generation, RecordError>;

    async fn complete(&self, id: DbId, output: &CompleteGeneration) -> Result<bool, RecordError>;

    async fn fail(
        &self,
        id: DbId,
        error: &str,
        processing_time: Option<f64>,
    ) -> Result<bool, RecordError>;

    async fn find(&self, id: DbId) -> Result<Option<Generation>, RecordError>;

    async fn list(&self, query: &GenerationListQuery) -> Result<GenerationPage, RecordError>;

    async fn delete(&self, id: DbId) -> Result<bool, RecordError>;

    async fn health_check(&self) -> Result<(), RecordError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

pub struct PgJobRecords {
    pool: DbPool,
}

impl PgJobRecords {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRecords for PgJobRecords {
    async fn create(&self, input: &CreateGeneration) -> Result<Generation, RecordError> {
        Ok(GenerationRepo::create(&self.pool, input).await?)
    }

    async fn complete(&self, id: DbId, output: &CompleteGeneration) -> Result<bool, RecordError> {
        Ok(GenerationRepo::complete(&self.pool, id, output).await?)
    }

    async fn fail(
        &self,
        id: DbId,
        error: &str,
        processing_time: Option<f64>,
    ) -> Result<bool, RecordError> {
        Ok(GenerationRepo::fail(&self.pool, id, error, processing_time).await?)
    }

    async fn find(&self, id: DbId) -> Result<Option<Generation>, RecordError> {
        Ok(GenerationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list(&self, query: &GenerationListQuery) -> Result<GenerationPage, RecordError> {
        Ok(GenerationRepo::list(&self.pool, query).await?)
    }

    async fn delete(&self, id: DbId) -> Result<bool, RecordError> {
        Ok(GenerationRepo::delete(&self.pool, id).await?)
    }

    async fn health_check(&self) -> Result<(), RecordError> {
        Ok(genhub_db::health_check(&self.pool).await?)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Default)]
pub struct MemoryJobRecords {
    rows: RwLock<BTreeMap<DbId, Generation>>,
    last_id: AtomicI64,
}

impl MemoryJobRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a terminal transition if the row is still processing.
    async fn transition(&self, id: DbId, apply: impl FnOnce(&mut Generation)) -> bool {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(row) if row.status_id == GenerationStatus::Processing.id() => {
                apply(row);
                row.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }
}

fn matches_query(row: &Generation, query: &GenerationListQuery, status_id: Option<i16>) -> bool {
    if query
        .generation_kind
        .as_deref()
        .is_some_and(|kind| row.generation_kind != kind)
    {
        return false;
    }
    if status_id.is_some_and(|sid| row.status_id != sid) {
        return false;
    }
    if query.favorite.is_some_and(|fav| row.favorite != fav) {
        return false;
    }
    if let Some(needle) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let needle = needle.to_lowercase();
        let in_prompt = row.prompt.to_lowercase().contains(&needle);
        let in_negative = row
            .negative_prompt
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&needle));
        if !in_prompt && !in_negative {
            return false;
        }
    }
    true
}

#[async_trait]
impl JobRecords for MemoryJobRecords {
    async fn create(&self, input: &CreateGeneration) -> Result<Generation, RecordError> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = Generation {
            id,
            generation_kind: input.generation_kind.as_str().to_string(),
            prompt: input.prompt.clone(),
            negative_prompt: input.negative_prompt.clone(),
            parameters: input.parameters.clone(),
            status_id: GenerationStatus::Processing.id(),
            output_path: None,
            output_url: None,
            seed: None,
            error_message: None,
            favorite: false,
            notes: None,
            created_at: Utc::now(),
            completed_at: None,
            processing_time: None,
        };
        self.rows.write().await.insert(id, row.clone());
        Ok(row)
    }

    async fn complete(&self, id: DbId, output: &CompleteGeneration) -> Result<bool, RecordError> {
        Ok(self
            .transition(id, |row| {
                row.status_id = GenerationStatus::Completed.id();
                row.output_path = output.output_path.clone();
                row.output_url = output.output_url.clone();
                row.seed = output.seed;
                row.processing_time = Some(output.processing_time);
            })
            .await)
    }

    async fn fail(
        &self,
        id: DbId,
        error: &str,
        processing_time: Option<f64>,
    ) -> Result<bool, RecordError> {
        Ok(self
            .transition(id, |row| {
                row.status_id = GenerationStatus::Failed.id();
                row.error_message = Some(error.to_string());
                row.processing_time = processing_time;
            })
            .await)
    }

    async fn find(&self, id: DbId) -> Result<Option<Generation>, RecordError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &GenerationListQuery) -> Result<GenerationPage, RecordError> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);
        let status_id = query
            .status
            .as_deref()
            .and_then(|s| s.parse::<GenerationStatus>().ok())
            .map(GenerationStatus::id);

        let rows = self.rows.read().await;
        // Ids are assigned in creation order, so reverse id order is newest first.
        let matching: Vec<&Generation> = rows
            .values()
            .rev()
            .filter(|row| matches_query(row, query, status_id))
            .collect();

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let items = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok(GenerationPage { items, total })
    }

    async fn delete(&self, id: DbId) -> Result<bool, RecordError> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }

    async fn health_check(&self) -> Result<(), RecordError> {
        Ok(())
    }
}
