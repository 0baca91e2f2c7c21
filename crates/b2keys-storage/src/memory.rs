// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory storage backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entry::StorageEntry;
use crate::error::Result;
use crate::{collapse_listing, validate_key, Storage};

#[derive(Debug, Default)]
pub struct MemoryStorage {
	entries: RwLock<BTreeMap<String, (Vec<u8>, u64)>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl Storage for MemoryStorage {
	async fn get(&self, key: &str) -> Result<Option<StorageEntry>> {
		validate_key(key)?;
		let entries = self.entries.read().await;
		Ok(entries.get(key).map(|(value, version)| StorageEntry {
			key: key.to_string(),
			value: value.clone(),
			version: *version,
		}))
	}

	async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64> {
		validate_key(key)?;
		let mut entries = self.entries.write().await;
		let version = entries.get(key).map(|(_, v)| v + 1).unwrap_or(1);
		entries.insert(key.to_string(), (value, version));
		Ok(version)
	}

	async fn delete(&self, key: &str) -> Result<bool> {
		validate_key(key)?;
		Ok(self.entries.write().await.remove(key).is_some())
	}

	async fn list(&self, prefix: &str) -> Result<Vec<String>> {
		let entries = self.entries.read().await;
		let keys = entries
			.range(prefix.to_string()..)
			.map(|(k, _)| k.as_str())
			.take_while(|k| k.starts_with(prefix));
		Ok(collapse_listing(prefix, keys))
	}
}
