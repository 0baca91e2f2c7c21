// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite storage backend.
//!
//! Every entry lives in one `entries` table keyed by its full path.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::entry::StorageEntry;
use crate::error::Result;
use crate::pool::create_pool;
use crate::{collapse_listing, validate_key, Storage};

/// Storage backed by a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
	pool: SqlitePool,
}

impl SqliteStorage {
	/// Wrap an existing pool. Call [`migrate`](Self::migrate) before use.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Open (creating if missing) the database at `url`.
	pub async fn connect(url: &str) -> Result<Self> {
		Ok(Self::new(create_pool(url).await?))
	}

	/// Create the `entries` table if it does not exist.
	#[tracing::instrument(skip(self))]
	pub async fn migrate(&self) -> Result<()> {
		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS entries (
				key TEXT PRIMARY KEY,
				value BLOB NOT NULL,
				version INTEGER NOT NULL,
				updated_at TEXT NOT NULL
			)
			"#,
		)
		.execute(&self.pool)
		.await?;

		tracing::debug!("storage schema ready");
		Ok(())
	}
}

#[async_trait]
impl Storage for SqliteStorage {
	#[tracing::instrument(skip(self))]
	async fn get(&self, key: &str) -> Result<Option<StorageEntry>> {
		validate_key(key)?;
		let row = sqlx::query("SELECT value, version FROM entries WHERE key = ?")
			.bind(key)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.map(|row| StorageEntry {
			key: key.to_string(),
			value: row.get::<Vec<u8>, _>("value"),
			version: row.get::<i64, _>("version") as u64,
		}))
	}

	#[tracing::instrument(skip(self, value), fields(len = value.len()))]
	async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64> {
		validate_key(key)?;
		let row = sqlx::query(
			r#"
			INSERT INTO entries (key, value, version, updated_at)
			VALUES (?, ?, 1, ?)
			ON CONFLICT(key) DO UPDATE SET
				value = excluded.value,
				version = entries.version + 1,
				updated_at = excluded.updated_at
			RETURNING version
			"#,
		)
		.bind(key)
		.bind(value)
		.bind(Utc::now().to_rfc3339())
		.fetch_one(&self.pool)
		.await?;

		let version = row.get::<i64, _>("version") as u64;
		tracing::debug!(version, "entry written");
		Ok(version)
	}

	#[tracing::instrument(skip(self))]
	async fn delete(&self, key: &str) -> Result<bool> {
		validate_key(key)?;
		let result = sqlx::query("DELETE FROM entries WHERE key = ?")
			.bind(key)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self))]
	async fn list(&self, prefix: &str) -> Result<Vec<String>> {
		let rows = sqlx::query(
			"SELECT key FROM entries WHERE substr(key, 1, length(?)) = ? ORDER BY key",
		)
		.bind(prefix)
		.bind(prefix)
		.fetch_all(&self.pool)
		.await?;

		let keys: Vec<String> = rows.iter().map(|row| row.get::<String, _>("key")).collect();
		Ok(collapse_listing(prefix, keys.iter().map(String::as_str)))
	}
}
