// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory control plane for tests.
//!
//! Keeps every application key in a map, lets tests script failures, and can
//! hold remote calls open behind a gate so concurrent operations can be
//! interleaved deterministically.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use b2keys_common_secret::SecretString;
use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::client::{ControlPlane, ControlPlaneConnector};
use crate::error::{ControlPlaneError, Result};
use crate::types::{AccountInfo, Capability, CapabilitySet, CreatedKey, KeyRequest, RootCredential};

pub const MEMORY_ACCOUNT_ID: &str = "acct-memory";

/// A key held by the fake.
#[derive(Debug, Clone)]
pub struct StoredKey {
	pub key_id: String,
	pub application_key: SecretString,
	pub key_name: String,
	pub capabilities: CapabilitySet,
	pub bucket: Option<String>,
	pub name_prefix: Option<String>,
	pub valid_duration: Option<Duration>,
	/// Root key id of the client that minted this key; `None` for seeded keys.
	pub minted_by: Option<String>,
}

#[derive(Debug, Default)]
struct Failures {
	connects: usize,
	creates: usize,
	deletes: usize,
}

#[derive(Debug)]
struct Shared {
	keys: Mutex<BTreeMap<String, StoredKey>>,
	buckets: Mutex<BTreeSet<String>>,
	failures: Mutex<Failures>,
	gate: watch::Sender<bool>,
	next_id: AtomicUsize,
	connects: AtomicUsize,
	creates: AtomicUsize,
	deletes: AtomicUsize,
	in_flight: AtomicUsize,
}

/// Shared in-memory control plane; clones observe the same state.
#[derive(Debug, Clone)]
pub struct MemoryControlPlane {
	shared: Arc<Shared>,
}

impl Default for MemoryControlPlane {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryControlPlane {
	pub fn new() -> Self {
		let (gate, _) = watch::channel(true);
		Self {
			shared: Arc::new(Shared {
				keys: Mutex::new(BTreeMap::new()),
				buckets: Mutex::new(BTreeSet::new()),
				failures: Mutex::new(Failures::default()),
				gate,
				next_id: AtomicUsize::new(1),
				connects: AtomicUsize::new(0),
				creates: AtomicUsize::new(0),
				deletes: AtomicUsize::new(0),
				in_flight: AtomicUsize::new(0),
			}),
		}
	}

	/// Register a root key with full key-management capabilities and return
	/// a credential for it.
	pub async fn seed_root_key(&self, key_id: &str, application_key: &str) -> RootCredential {
		let capabilities: CapabilitySet = [
			Capability::ListKeys,
			Capability::WriteKeys,
			Capability::DeleteKeys,
			Capability::ListBuckets,
			Capability::ReadFiles,
			Capability::WriteFiles,
			Capability::ListFiles,
		]
		.into_iter()
		.collect();

		self.shared.keys.lock().await.insert(
			key_id.to_string(),
			StoredKey {
				key_id: key_id.to_string(),
				application_key: SecretString::new(application_key.to_string()),
				key_name: "seeded-root".to_string(),
				capabilities,
				bucket: None,
				name_prefix: None,
				valid_duration: None,
				minted_by: None,
			},
		);
		RootCredential::new(key_id, application_key)
	}

	pub async fn add_bucket(&self, name: &str) {
		self.shared.buckets.lock().await.insert(name.to_string());
	}

	pub async fn key(&self, key_id: &str) -> Option<StoredKey> {
		self.shared.keys.lock().await.get(key_id).cloned()
	}

	pub async fn key_ids(&self) -> Vec<String> {
		self.shared.keys.lock().await.keys().cloned().collect()
	}

	pub async fn fail_next_connects(&self, n: usize) {
		self.shared.failures.lock().await.connects = n;
	}

	pub async fn fail_next_creates(&self, n: usize) {
		self.shared.failures.lock().await.creates = n;
	}

	pub async fn fail_next_deletes(&self, n: usize) {
		self.shared.failures.lock().await.deletes = n;
	}

	/// Make subsequent `create_key`/`delete_key` calls wait until [`open_gate`](Self::open_gate).
	pub fn close_gate(&self) {
		self.shared.gate.send_replace(false);
	}

	pub fn open_gate(&self) {
		self.shared.gate.send_replace(true);
	}

	/// Wait until at least `n` remote calls are parked at the gate or running.
	pub async fn wait_for_in_flight(&self, n: usize) {
		while self.shared.in_flight.load(Ordering::SeqCst) < n {
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	}

	pub fn connect_calls(&self) -> usize {
		self.shared.connects.load(Ordering::SeqCst)
	}

	pub fn create_calls(&self) -> usize {
		self.shared.creates.load(Ordering::SeqCst)
	}

	pub fn delete_calls(&self) -> usize {
		self.shared.deletes.load(Ordering::SeqCst)
	}

	async fn take_failure(&self, pick: impl FnOnce(&mut Failures) -> &mut usize) -> bool {
		let mut failures = self.shared.failures.lock().await;
		let slot = pick(&mut *failures);
		if *slot > 0 {
			*slot -= 1;
			true
		} else {
			false
		}
	}

	async fn pass_gate(&self) {
		let mut rx = self.shared.gate.subscribe();
		// Sender lives in `shared`, so the channel cannot close while we wait.
		let _ = rx.wait_for(|open| *open).await;
	}
}

fn injected_failure(operation: &str) -> ControlPlaneError {
	ControlPlaneError::Api {
		status: 500,
		code: "internal_error".to_string(),
		message: format!("injected {operation} failure"),
	}
}

#[async_trait]
impl ControlPlaneConnector for MemoryControlPlane {
	async fn connect(&self, credential: &RootCredential) -> Result<Arc<dyn ControlPlane>> {
		self.shared.connects.fetch_add(1, Ordering::SeqCst);
		if self.take_failure(|f| &mut f.connects).await {
			return Err(injected_failure("connect"));
		}

		let keys = self.shared.keys.lock().await;
		let stored = keys
			.get(&credential.key_id)
			.filter(|k| k.application_key == credential.application_key)
			.ok_or_else(|| ControlPlaneError::Unauthorized("invalid application key".to_string()))?;

		Ok(Arc::new(MemoryClient {
			plane: self.clone(),
			root_key_id: credential.key_id.clone(),
			account: AccountInfo {
				account_id: MEMORY_ACCOUNT_ID.to_string(),
				capabilities: stored.capabilities.clone(),
				api_url: "memory://control-plane".to_string(),
			},
		}))
	}
}

/// Client handle bound to one root key of a [`MemoryControlPlane`].
#[derive(Debug)]
pub struct MemoryClient {
	plane: MemoryControlPlane,
	root_key_id: String,
	account: AccountInfo,
}

impl MemoryClient {
	pub fn root_key_id(&self) -> &str {
		&self.root_key_id
	}

	/// A client stops working once its root key is deleted.
	async fn check_root(&self) -> Result<()> {
		if self.plane.shared.keys.lock().await.contains_key(&self.root_key_id) {
			Ok(())
		} else {
			Err(ControlPlaneError::Unauthorized(
				"auth token of deleted key".to_string(),
			))
		}
	}
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
	fn enter(counter: &'a AtomicUsize) -> Self {
		counter.fetch_add(1, Ordering::SeqCst);
		Self(counter)
	}
}

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl ControlPlane for MemoryClient {
	fn account(&self) -> &AccountInfo {
		&self.account
	}

	async fn create_key(&self, request: &KeyRequest) -> Result<CreatedKey> {
		let shared = &self.plane.shared;
		shared.creates.fetch_add(1, Ordering::SeqCst);
		let _in_flight = InFlight::enter(&shared.in_flight);
		self.plane.pass_gate().await;
		self.check_root().await?;

		if self.plane.take_failure(|f| &mut f.creates).await {
			return Err(injected_failure("create_key"));
		}

		if let Some(bucket) = &request.bucket {
			if !shared.buckets.lock().await.contains(bucket) {
				return Err(ControlPlaneError::BucketNotFound(bucket.clone()));
			}
		}

		let n = shared.next_id.fetch_add(1, Ordering::SeqCst);
		let key_id = format!("005memkey{n:04}");
		let application_key = SecretString::new(format!("K005memsecret{n:04}"));
		let stored = StoredKey {
			key_id: key_id.clone(),
			application_key: application_key.clone(),
			key_name: request.key_name.clone(),
			capabilities: request.capabilities.clone(),
			bucket: request.bucket.clone(),
			name_prefix: request.bucket.as_ref().and(request.name_prefix.clone()),
			valid_duration: request.valid_duration,
			minted_by: Some(self.root_key_id.clone()),
		};
		shared.keys.lock().await.insert(key_id.clone(), stored.clone());

		Ok(CreatedKey {
			key_id,
			application_key,
			key_name: stored.key_name,
			capabilities: stored.capabilities,
			bucket_id: stored.bucket.map(|b| format!("bkt-{b}")),
			name_prefix: stored.name_prefix,
			expires_at: stored.valid_duration.and_then(|d| {
				chrono::Duration::from_std(d).ok().map(|d| Utc::now() + d)
			}),
		})
	}

	async fn delete_key(&self, key_id: &str) -> Result<()> {
		let shared = &self.plane.shared;
		shared.deletes.fetch_add(1, Ordering::SeqCst);
		let _in_flight = InFlight::enter(&shared.in_flight);
		self.plane.pass_gate().await;
		self.check_root().await?;

		if self.plane.take_failure(|f| &mut f.deletes).await {
			return Err(injected_failure("delete_key"));
		}

		match shared.keys.lock().await.remove(key_id) {
			Some(_) => Ok(()),
			None => Err(ControlPlaneError::NotFound(format!(
				"application key does not exist: {key_id}"
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn connect_requires_matching_secret() {
		let plane = MemoryControlPlane::new();
		let cred = plane.seed_root_key("005root", "K005root").await;

		assert!(plane.connect(&cred).await.is_ok());
		let wrong = RootCredential::new("005root", "nope");
		assert!(matches!(
			plane.connect(&wrong).await.unwrap_err(),
			ControlPlaneError::Unauthorized(_)
		));
	}

	#[tokio::test]
	async fn minted_key_can_connect_and_delete_twice_reports_not_found() {
		let plane = MemoryControlPlane::new();
		let cred = plane.seed_root_key("005root", "K005root").await;
		let client = plane.connect(&cred).await.unwrap();

		let created = client
			.create_key(&KeyRequest {
				key_name: "rotated".to_string(),
				capabilities: client.account().capabilities.clone(),
				bucket: None,
				name_prefix: None,
				valid_duration: None,
			})
			.await
			.unwrap();
		let minted = RootCredential::new(created.key_id.clone(), created.application_key.clone());
		assert!(plane.connect(&minted).await.is_ok());

		client.delete_key(&created.key_id).await.unwrap();
		assert!(client.delete_key(&created.key_id).await.unwrap_err().is_not_found());
	}

	#[tokio::test]
	async fn client_of_deleted_root_is_rejected() {
		let plane = MemoryControlPlane::new();
		let old = plane.seed_root_key("005old", "K005old").await;
		let new = plane.seed_root_key("005new", "K005new").await;
		let old_client = plane.connect(&old).await.unwrap();
		let new_client = plane.connect(&new).await.unwrap();

		new_client.delete_key("005old").await.unwrap();
		assert!(matches!(
			old_client.delete_key("005new").await.unwrap_err(),
			ControlPlaneError::Unauthorized(_)
		));
		assert!(plane.key("005new").await.is_some());
	}

	#[tokio::test]
	async fn scripted_failures_are_consumed() {
		let plane = MemoryControlPlane::new();
		let cred = plane.seed_root_key("005root", "K005root").await;
		let client = plane.connect(&cred).await.unwrap();
		plane.fail_next_deletes(1).await;

		assert!(matches!(
			client.delete_key("005root").await.unwrap_err(),
			ControlPlaneError::Api { status: 500, .. }
		));
		assert!(client.delete_key("005root").await.is_ok());
		assert_eq!(plane.delete_calls(), 2);
	}
}
