//! Matchday DB - PostgreSQL repository layer.
//!
//! This crate provides the persistent implementations of the matchday-core
//! storage seams:
//!
//! - [`SnapshotRepository`] - versioned entity snapshots with as-of reads
//! - [`CheckpointRepository`] - backfill progress checkpoints

mod checkpoint_repository;
mod snapshot_repository;

pub use checkpoint_repository::CheckpointRepository;
pub use snapshot_repository::SnapshotRepository;

use matchday_core::AppError;
use sqlx::PgPool;

/// Applies the embedded migrations to the connected database.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Generic(format!("Migration failed: {}", e)))
}
