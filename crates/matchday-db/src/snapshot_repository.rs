//! Snapshot repository for PostgreSQL.
//!
//! Implements the `SnapshotStore` contract: upserts keyed by
//! `(entity_id, scope, logical_date)` and as-of reads that return the
//! newest version at or before the requested date.

use chrono::{DateTime, NaiveDate, Utc};
use matchday_core::error::AppError;
use matchday_core::model::{Scope, SeasonMarker};
use matchday_core::snapshot::{NewSnapshot, Snapshot, SnapshotStore};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Column list for SELECT queries. Kept as a const literal so every query
/// decodes into the same row shape.
const SNAPSHOT_COLUMNS: &str =
    "id, entity_id, scope, logical_date, payload, source, captured_at, updated_at";

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    entity_id: String,
    scope: String,
    logical_date: NaiveDate,
    payload: serde_json::Value,
    source: String,
    captured_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Snapshot {
            id: row.id,
            entity_id: row.entity_id,
            scope: Scope::new(row.scope),
            logical_date: row.logical_date,
            payload: row.payload,
            source: row.source,
            captured_at: row.captured_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeasonRow {
    season_id: String,
    start_date: NaiveDate,
}

/// Repository for snapshot persistence in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use matchday_db::SnapshotRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/matchday")
///     .await?;
///
/// let repo = SnapshotRepository::new(pool);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SnapshotRepository {
    pool: Pool<Postgres>,
}

impl SnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SnapshotStore for SnapshotRepository {
    async fn upsert(&self, snapshot: NewSnapshot) -> Result<Snapshot, AppError> {
        let row: SnapshotRow = sqlx::query_as(
            r#"
            INSERT INTO snapshots (entity_id, scope, logical_date, payload, source)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (entity_id, scope, logical_date)
            DO UPDATE SET
                payload = EXCLUDED.payload,
                source = EXCLUDED.source,
                updated_at = NOW()
            RETURNING id, entity_id, scope, logical_date, payload, source, captured_at, updated_at
            "#,
        )
        .bind(&snapshot.entity_id)
        .bind(snapshot.scope.as_str())
        .bind(snapshot.logical_date)
        .bind(&snapshot.payload)
        .bind(&snapshot.source)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.into())
    }

    async fn upsert_many(&self, snapshots: Vec<NewSnapshot>) -> Result<usize, AppError> {
        let count = snapshots.len();
        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;

        for snapshot in &snapshots {
            sqlx::query(
                r#"
                INSERT INTO snapshots (entity_id, scope, logical_date, payload, source)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (entity_id, scope, logical_date)
                DO UPDATE SET
                    payload = EXCLUDED.payload,
                    source = EXCLUDED.source,
                    updated_at = NOW()
                "#,
            )
            .bind(&snapshot.entity_id)
            .bind(snapshot.scope.as_str())
            .bind(snapshot.logical_date)
            .bind(&snapshot.payload)
            .bind(&snapshot.source)
            .execute(&mut *tx)
            .await
            .map_err(AppError::DatabaseError)?;
        }

        tx.commit().await.map_err(AppError::DatabaseError)?;
        tracing::debug!(count, "Snapshot batch committed");
        Ok(count)
    }

    async fn get_as_of(
        &self,
        entity_id: &str,
        scope: &Scope,
        as_of: NaiveDate,
    ) -> Result<Option<Snapshot>, AppError> {
        let row: Option<SnapshotRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM snapshots
            WHERE entity_id = $1 AND scope = $2 AND logical_date <= $3
            ORDER BY logical_date DESC
            LIMIT 1
            "#
        ))
        .bind(entity_id)
        .bind(scope.as_str())
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.map(Into::into))
    }

    async fn history(&self, entity_id: &str, scope: &Scope) -> Result<Vec<Snapshot>, AppError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM snapshots
            WHERE entity_id = $1 AND scope = $2
            ORDER BY logical_date ASC
            "#
        ))
        .bind(entity_id)
        .bind(scope.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn current_season(&self, scope: &Scope) -> Result<Option<SeasonMarker>, AppError> {
        let row: Option<SeasonRow> = sqlx::query_as(
            r#"
            SELECT season_id, start_date
            FROM current_seasons
            WHERE scope = $1
            "#,
        )
        .bind(scope.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.map(|r| SeasonMarker::new(r.season_id, r.start_date)))
    }

    async fn record_season(&self, scope: &Scope, marker: &SeasonMarker) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO current_seasons (scope, season_id, start_date, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (scope)
            DO UPDATE SET
                season_id = EXCLUDED.season_id,
                start_date = EXCLUDED.start_date,
                updated_at = NOW()
            "#,
        )
        .bind(scope.as_str())
        .bind(&marker.id)
        .bind(marker.start_date)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(())
    }

    async fn prune_before(&self, scope: &Scope, cutoff: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM snapshots
            WHERE scope = $1 AND logical_date < $2
            "#,
        )
        .bind(scope.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        tracing::info!(
            scope = %scope,
            cutoff = %cutoff,
            deleted = result.rows_affected(),
            "Pruned old snapshot versions"
        );
        Ok(result.rows_affected())
    }
}
