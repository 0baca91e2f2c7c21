// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable storage for b2keys.
//!
//! The engine sees storage as a string-keyed, versioned key-value store
//! ([`Storage`]). Two backends are provided:
//!
//! - [`MemoryStorage`]: process-local, for tests and throwaway runs
//! - [`SqliteStorage`]: a single SQLite table in WAL mode
//!
//! [`open_storage`] picks one from a configured URL.

pub mod entry;
pub mod error;
pub mod memory;
pub mod pool;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

pub use entry::{to_json_bytes, StorageEntry};
pub use error::{Result, StorageError};
pub use memory::MemoryStorage;
pub use pool::create_pool;
pub use sqlite::SqliteStorage;

/// URL selecting [`MemoryStorage`].
pub const MEMORY_URL: &str = "memory:";

/// String-keyed, versioned key-value store.
///
/// Writes to a single key are last-writer-wins; there are no cross-key
/// transactions.
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
	/// Read an entry, `None` when absent.
	async fn get(&self, key: &str) -> Result<Option<StorageEntry>>;

	/// Write an entry, replacing any previous value. Returns the new version,
	/// starting at 1 for a key that did not exist.
	async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64>;

	/// Remove an entry. Returns whether it existed.
	async fn delete(&self, key: &str) -> Result<bool>;

	/// List the keys directly under `prefix`, sorted, with `prefix` stripped.
	///
	/// Keys nested deeper are reported once as `child/`.
	async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Open the backend named by `url` (`memory:` or a `sqlite:` URL).
#[tracing::instrument]
pub async fn open_storage(url: &str) -> Result<Arc<dyn Storage>> {
	if url == MEMORY_URL {
		tracing::debug!("using in-memory storage");
		return Ok(Arc::new(MemoryStorage::new()));
	}

	if url.starts_with("sqlite:") {
		let storage = SqliteStorage::connect(url).await?;
		storage.migrate().await?;
		return Ok(Arc::new(storage));
	}

	Err(StorageError::InvalidUrl(url.to_string()))
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
	if key.is_empty() || key.starts_with('/') {
		return Err(StorageError::InvalidKey(key.to_string()));
	}
	Ok(())
}

/// Collapse full keys under `prefix` into one listing level.
///
/// Every key in `keys` must start with `prefix`.
pub(crate) fn collapse_listing<'a>(prefix: &str, keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();
	for key in keys {
		let rest = &key[prefix.len()..];
		let item = match rest.find('/') {
			Some(idx) => &rest[..=idx],
			None => rest,
		};
		if !item.is_empty() {
			out.push(item.to_string());
		}
	}
	out.sort();
	out.dedup();
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn collapse_listing_groups_nested_keys() {
		let keys = ["roles/a", "roles/b", "roles/nested/x", "roles/nested/y"];
		assert_eq!(
			collapse_listing("roles/", keys),
			vec!["a".to_string(), "b".to_string(), "nested/".to_string()]
		);
	}

	#[test]
	fn validate_key_rejects_empty_and_absolute() {
		assert!(validate_key("").is_err());
		assert!(validate_key("/config").is_err());
		assert!(validate_key("roles/reader").is_ok());
	}

	#[tokio::test]
	async fn open_storage_rejects_unknown_scheme() {
		let err = open_storage("postgres://localhost/db").await.unwrap_err();
		assert!(matches!(err, StorageError::InvalidUrl(_)));
	}

	#[tokio::test]
	async fn open_storage_memory() {
		let storage = open_storage(MEMORY_URL).await.unwrap();
		storage.put("config", b"{}".to_vec()).await.unwrap();
		assert!(storage.get("config").await.unwrap().is_some());
	}

	proptest! {
		#[test]
		fn collapse_listing_is_sorted_and_unique(names in proptest::collection::vec("[a-z]{1,6}(/[a-z]{1,4})?", 0..20)) {
			let mut keys: Vec<String> = names.iter().map(|n| format!("roles/{n}")).collect();
			keys.sort();
			let listed = collapse_listing("roles/", keys.iter().map(String::as_str));
			let mut sorted = listed.clone();
			sorted.sort();
			sorted.dedup();
			prop_assert_eq!(listed, sorted);
		}
	}
}
