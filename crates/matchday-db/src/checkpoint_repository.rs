//! Backfill checkpoint repository for PostgreSQL.

use chrono::{DateTime, NaiveDate, Utc};
use matchday_core::backfill::{BackfillCheckpoint, BackfillStatus, CheckpointStore};
use matchday_core::error::AppError;
use matchday_core::model::Scope;
use sqlx::{PgPool, Pool, Postgres};

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    provider: String,
    scope: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    cursor: NaiveDate,
    status: String,
    records_imported: i64,
    last_error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CheckpointRow> for BackfillCheckpoint {
    type Error = AppError;

    fn try_from(row: CheckpointRow) -> Result<Self, Self::Error> {
        Ok(BackfillCheckpoint {
            provider: row.provider,
            scope: Scope::new(row.scope),
            start_date: row.start_date,
            end_date: row.end_date,
            cursor: row.cursor,
            status: row.status.parse::<BackfillStatus>()?,
            records_imported: row.records_imported.max(0) as u64,
            last_error: row.last_error,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for backfill checkpoints, one row per `(provider, scope)`.
#[derive(Clone)]
pub struct CheckpointRepository {
    pool: Pool<Postgres>,
}

impl CheckpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All stored checkpoints, newest first. Used by the status command.
    pub async fn list_all(&self) -> Result<Vec<BackfillCheckpoint>, AppError> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT provider, scope, start_date, end_date, cursor, status,
                   records_imported, last_error, updated_at
            FROM backfill_checkpoints
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

impl CheckpointStore for CheckpointRepository {
    async fn load(
        &self,
        provider: &str,
        scope: &Scope,
    ) -> Result<Option<BackfillCheckpoint>, AppError> {
        let row: Option<CheckpointRow> = sqlx::query_as(
            r#"
            SELECT provider, scope, start_date, end_date, cursor, status,
                   records_imported, last_error, updated_at
            FROM backfill_checkpoints
            WHERE provider = $1 AND scope = $2
            "#,
        )
        .bind(provider)
        .bind(scope.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save(&self, checkpoint: &BackfillCheckpoint) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO backfill_checkpoints (
                provider, scope, start_date, end_date, cursor, status,
                records_imported, last_error, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (provider, scope)
            DO UPDATE SET
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                cursor = EXCLUDED.cursor,
                status = EXCLUDED.status,
                records_imported = EXCLUDED.records_imported,
                last_error = EXCLUDED.last_error,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&checkpoint.provider)
        .bind(checkpoint.scope.as_str())
        .bind(checkpoint.start_date)
        .bind(checkpoint.end_date)
        .bind(checkpoint.cursor)
        .bind(checkpoint.status.as_str())
        .bind(checkpoint.records_imported as i64)
        .bind(&checkpoint.last_error)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(())
    }
}
