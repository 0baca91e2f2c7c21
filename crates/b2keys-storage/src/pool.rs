// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::error::StorageError;

const MAX_CONNECTIONS: u32 = 4;

/// Writers wait this long on a locked database before failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the SQLite file backing a [`SqliteStorage`](crate::SqliteStorage).
///
/// WAL journal with `synchronous = FULL`: a root credential write that
/// returned must survive a power cut. The file is created if missing.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StorageError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| StorageError::InvalidUrl(format!("{database_url}: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Full)
		.busy_timeout(BUSY_TIMEOUT)
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(MAX_CONNECTIONS)
		.connect_with(options)
		.await?;

	tracing::debug!(max_connections = MAX_CONNECTIONS, "storage pool created");
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn unparseable_url_is_invalid_url() {
		let err = create_pool("sqlite://?mode=bogus").await.unwrap_err();
		assert!(matches!(err, StorageError::InvalidUrl(_)));
	}

	#[tokio::test]
	async fn pool_uses_wal_journal() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("b2keys.db").display());
		let pool = create_pool(&url).await.unwrap();

		let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(mode, "wal");
	}
}
