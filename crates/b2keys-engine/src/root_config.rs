// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The persisted root configuration at `config`.

use std::sync::Arc;

use b2keys_control_plane::RootCredential;
use b2keys_storage::{to_json_bytes, Storage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub(crate) const CONFIG_KEY: &str = "config";

/// What is stored at `config`. Carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RootConfigRecord {
	pub credential: RootCredential,
	pub account_id: String,
}

impl RootConfigRecord {
	pub fn view(&self) -> RootConfigView {
		RootConfigView {
			key_id: self.credential.key_id.clone(),
			account_id: self.account_id.clone(),
			created_at: self.credential.created_at,
		}
	}
}

/// Root configuration as shown to operators. Never includes the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootConfigView {
	pub key_id: String,
	pub account_id: String,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct RootConfigStore {
	storage: Arc<dyn Storage>,
}

impl RootConfigStore {
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		Self { storage }
	}

	pub async fn load(&self) -> Result<Option<RootConfigRecord>> {
		match self.storage.get(CONFIG_KEY).await? {
			Some(entry) => Ok(Some(entry.decode_json()?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self, record), fields(key_id = %record.credential.key_id))]
	pub async fn save(&self, record: &RootConfigRecord) -> Result<()> {
		let version = self
			.storage
			.put(CONFIG_KEY, to_json_bytes(CONFIG_KEY, record)?)
			.await?;
		tracing::debug!(version, "root config written");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use b2keys_storage::MemoryStorage;

	#[tokio::test]
	async fn save_and_load() {
		let store = RootConfigStore::new(Arc::new(MemoryStorage::new()));
		assert!(store.load().await.unwrap().is_none());

		let record = RootConfigRecord {
			credential: RootCredential::new("005root", "K005secret"),
			account_id: "acct".to_string(),
		};
		store.save(&record).await.unwrap();
		assert_eq!(store.load().await.unwrap(), Some(record));
	}

	#[test]
	fn view_omits_secret() {
		let record = RootConfigRecord {
			credential: RootCredential::new("005root", "K005secret"),
			account_id: "acct".to_string(),
		};
		let json = serde_json::to_string(&record.view()).unwrap();
		assert!(json.contains("005root"));
		assert!(!json.contains("K005secret"));
	}
}
