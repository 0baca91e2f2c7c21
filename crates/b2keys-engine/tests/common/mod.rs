// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use b2keys_control_plane::testing::MemoryControlPlane;
use b2keys_control_plane::{Capability, CapabilitySet};
use b2keys_engine::{Backend, BackendOptions};
use b2keys_storage::{MemoryStorage, Storage, StorageEntry, StorageError};

pub const ROOT_KEY_ID: &str = "005root";
pub const ROOT_SECRET: &str = "K005rootsecret";

pub fn caps(list: &[Capability]) -> CapabilitySet {
	list.iter().copied().collect()
}

/// A backend over `storage` with `005root` installed.
pub async fn configured_with(
	storage: Arc<dyn Storage>,
) -> (MemoryControlPlane, Backend) {
	let plane = MemoryControlPlane::new();
	plane.seed_root_key(ROOT_KEY_ID, ROOT_SECRET).await;
	let backend = Backend::new(storage, Arc::new(plane.clone()), BackendOptions::default());
	backend
		.write_config(ROOT_KEY_ID, ROOT_SECRET.into())
		.await
		.unwrap();
	(plane, backend)
}

pub async fn configured() -> (MemoryControlPlane, Backend) {
	configured_with(Arc::new(MemoryStorage::new())).await
}

#[derive(Debug, Default)]
struct ConfigFaults {
	pass: usize,
	fail: usize,
}

/// Memory storage with scripted failures of writes to `config`.
#[derive(Debug, Default)]
pub struct FlakyStorage {
	inner: MemoryStorage,
	faults: Mutex<ConfigFaults>,
}

impl FlakyStorage {
	pub fn fail_next_config_puts(&self, n: usize) {
		self.fail_config_puts_after(0, n);
	}

	/// Let `pass` writes to `config` through, then fail the next `fail`.
	pub fn fail_config_puts_after(&self, pass: usize, fail: usize) {
		*self.faults.lock().unwrap() = ConfigFaults { pass, fail };
	}

	fn config_put_fails(&self) -> bool {
		let mut faults = self.faults.lock().unwrap();
		if faults.pass > 0 {
			faults.pass -= 1;
			false
		} else if faults.fail > 0 {
			faults.fail -= 1;
			true
		} else {
			false
		}
	}
}

#[async_trait]
impl Storage for FlakyStorage {
	async fn get(&self, key: &str) -> b2keys_storage::Result<Option<StorageEntry>> {
		self.inner.get(key).await
	}

	async fn put(&self, key: &str, value: Vec<u8>) -> b2keys_storage::Result<u64> {
		if key == "config" && self.config_put_fails() {
			return Err(StorageError::InvalidKey("config (injected failure)".to_string()));
		}
		self.inner.put(key, value).await
	}

	async fn delete(&self, key: &str) -> b2keys_storage::Result<bool> {
		self.inner.delete(key).await
	}

	async fn list(&self, prefix: &str) -> b2keys_storage::Result<Vec<String>> {
		self.inner.list(prefix).await
	}
}
