// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::StoreError;

/// Create a SqlitePool for the grant store with WAL mode enabled.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./tollgate.db")
///
/// # Errors
/// Returns `StoreError::Internal` if the URL is invalid, or `StoreError::Sqlx`
/// if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StoreError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| StoreError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("grant store pool created");
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn creates_database_file() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("grants.db").display());
		let pool = create_pool(&url).await.unwrap();
		sqlx::query("SELECT 1").execute(&pool).await.unwrap();
		assert!(dir.path().join("grants.db").exists());
	}

	#[tokio::test]
	async fn rejects_malformed_url() {
		let err = create_pool("postgres://nope").await.unwrap_err();
		assert!(matches!(err, StoreError::Internal(_)));
	}
}
