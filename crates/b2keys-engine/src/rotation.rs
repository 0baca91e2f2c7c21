// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Root credential installation, activation and rotation.
//!
//! Every change to the active root goes through [`RotationCoordinator`],
//! which serializes them behind one mutex. Issuance and revocation never take
//! that mutex on the fast path; they read the holder and go.
//!
//! Rotation order:
//!
//! 1. mint a replacement root key with the current client (or take the one
//!    supplied by the operator)
//! 2. persist it to `config`
//! 3. authorize a client with it
//! 4. swap it into the holder
//! 5. wait for in-flight calls on the retired client to finish, then delete
//!    the retired root key, best effort
//!
//! A failure in steps 1-3 leaves the previous root active, and stored unless
//! restoring the stored record itself fails. In that case the new key stays
//! on the remote side so the stored record remains usable.

use std::sync::Arc;
use std::time::Duration;

use b2keys_control_plane::{
	ControlPlane, ControlPlaneConnector, ControlPlaneError, KeyRequest, RootCredential,
};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{EngineError, Result, RotationStage};
use crate::holder::{ActiveRoot, RootCredentialHolder};
use crate::root_config::{RootConfigRecord, RootConfigStore, RootConfigView};

/// Result of a successful rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationOutcome {
	pub new_key_id: String,
	pub retired_key_id: String,
	/// False when deleting the retired key failed; it is left for remote cleanup.
	pub old_key_deleted: bool,
}

#[derive(Debug)]
pub struct RotationCoordinator {
	holder: Arc<RootCredentialHolder>,
	config: RootConfigStore,
	connector: Arc<dyn ControlPlaneConnector>,
	key_name_prefix: String,
	drain_timeout: Duration,
	lock: Mutex<()>,
}

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl RotationCoordinator {
	pub(crate) fn new(
		holder: Arc<RootCredentialHolder>,
		config: RootConfigStore,
		connector: Arc<dyn ControlPlaneConnector>,
		key_name_prefix: String,
		drain_timeout: Duration,
	) -> Self {
		Self {
			holder,
			config,
			connector,
			key_name_prefix,
			drain_timeout,
			lock: Mutex::new(()),
		}
	}

	/// The active client, activating the stored root if nothing is active yet.
	pub async fn client(&self) -> Result<Arc<dyn ControlPlane>> {
		if let Some(client) = self.holder.current_client().await {
			return Ok(client);
		}

		let _guard = self.lock.lock().await;
		Ok(Arc::clone(&self.active_or_load().await?.client))
	}

	/// Activate whatever root is stored at `config`.
	///
	/// Returns `None` when nothing is stored.
	#[tracing::instrument(skip(self))]
	pub async fn activate_stored(&self) -> Result<Option<RootConfigView>> {
		let _guard = self.lock.lock().await;
		match self.active_or_load().await {
			Ok(active) => Ok(Some(RootConfigView {
				key_id: active.credential.key_id.clone(),
				account_id: active.client.account().account_id.clone(),
				created_at: active.credential.created_at,
			})),
			Err(EngineError::NotConfigured) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Verify `credential` against the control plane, persist it and make it
	/// active. The previous root key is left untouched.
	#[tracing::instrument(skip(self, credential), fields(key_id = %credential.key_id))]
	pub async fn install(&self, credential: RootCredential) -> Result<RootConfigView> {
		let _guard = self.lock.lock().await;

		let client = self
			.connector
			.connect(&credential)
			.await
			.map_err(connect_error)?;
		let record = RootConfigRecord {
			credential: credential.clone(),
			account_id: client.account().account_id.clone(),
		};
		self.config.save(&record).await?;
		self.holder.swap(ActiveRoot { credential, client }).await;

		tracing::info!(account_id = %record.account_id, "root credential installed");
		Ok(record.view())
	}

	/// Replace the active root credential.
	///
	/// With `supplied` set, that credential is used instead of minting one.
	#[tracing::instrument(skip(self, supplied), fields(supplied = supplied.is_some()))]
	pub async fn rotate(&self, supplied: Option<RootCredential>) -> Result<RotationOutcome> {
		let _guard = self.lock.lock().await;

		let old = self.active_or_load().await?;
		let old_record = RootConfigRecord {
			credential: old.credential.clone(),
			account_id: old.client.account().account_id.clone(),
		};

		let minted = supplied.is_none();
		let credential = match supplied {
			Some(credential) => credential,
			None => self.mint(old.client.as_ref()).await?,
		};
		let new_key_id = credential.key_id.clone();

		let mut record = RootConfigRecord {
			credential: credential.clone(),
			account_id: old_record.account_id.clone(),
		};
		if let Err(e) = self.config.save(&record).await {
			tracing::error!(error = %e, "failed to persist new root credential");
			if minted {
				discard_key(old.client.as_ref(), &new_key_id).await;
			}
			return Err(EngineError::rotation(RotationStage::Persist, e));
		}

		let client = match self.connector.connect(&credential).await {
			Ok(client) => client,
			Err(e) => {
				tracing::error!(error = %e, "new root credential failed to authorize");
				match self.config.save(&old_record).await {
					Ok(()) if minted => discard_key(old.client.as_ref(), &new_key_id).await,
					Ok(()) => {}
					Err(restore) => tracing::error!(
						error = %restore,
						key_id = %new_key_id,
						"failed to restore previous root config; keeping the stored root key"
					),
				}
				return Err(EngineError::rotation(RotationStage::Connect, e));
			}
		};

		if client.account().account_id != record.account_id {
			record.account_id = client.account().account_id.clone();
			if let Err(e) = self.config.save(&record).await {
				tracing::warn!(error = %e, "failed to record account id of new root credential");
			}
		}

		self.holder
			.swap(ActiveRoot {
				credential,
				client: Arc::clone(&client),
			})
			.await;
		tracing::info!(new_key_id = %new_key_id, "root credential rotated");

		let retired_key_id = old.credential.key_id.clone();
		let old_key_deleted = if retired_key_id == new_key_id {
			false
		} else if !drain(&old.client, self.drain_timeout).await {
			tracing::warn!(
				key_id = %retired_key_id,
				"retired root key still in use; leaving it for remote cleanup"
			);
			false
		} else {
			retire_key(client.as_ref(), &retired_key_id).await
		};

		Ok(RotationOutcome {
			new_key_id,
			retired_key_id,
			old_key_deleted,
		})
	}

	/// Active root, or the stored one activated. Caller holds `self.lock`.
	async fn active_or_load(&self) -> Result<Arc<ActiveRoot>> {
		if let Some(active) = self.holder.current().await {
			return Ok(active);
		}

		let record = self.config.load().await?.ok_or(EngineError::NotConfigured)?;
		let client = self
			.connector
			.connect(&record.credential)
			.await
			.map_err(connect_error)?;
		self.holder
			.swap(ActiveRoot {
				credential: record.credential,
				client,
			})
			.await;
		tracing::info!("stored root credential activated");

		self.holder.current().await.ok_or(EngineError::NotConfigured)
	}

	async fn mint(&self, client: &dyn ControlPlane) -> Result<RootCredential> {
		let request = KeyRequest {
			key_name: format!("{}{}", self.key_name_prefix, Utc::now().timestamp()),
			capabilities: client.account().capabilities.clone(),
			bucket: None,
			name_prefix: None,
			valid_duration: None,
		};

		let created = client.create_key(&request).await.map_err(|e| {
			tracing::error!(error = %e, "failed to mint new root key");
			EngineError::rotation(RotationStage::Mint, e)
		})?;

		tracing::debug!(key_id = %created.key_id, "minted new root key");
		Ok(RootCredential::new(created.key_id, created.application_key))
	}
}

fn connect_error(e: ControlPlaneError) -> EngineError {
	match e {
		ControlPlaneError::Unauthorized(message) => {
			EngineError::InvalidConfig(format!("root credential rejected: {message}"))
		}
		source => EngineError::ControlPlane {
			operation: "authorize",
			source,
		},
	}
}

/// Wait until `client` is referenced only by its retired [`ActiveRoot`].
/// Returns false on timeout.
async fn drain(client: &Arc<dyn ControlPlane>, timeout: Duration) -> bool {
	let idle = async {
		while Arc::strong_count(client) > 1 {
			tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
		}
	};
	tokio::time::timeout(timeout, idle).await.is_ok()
}

/// Delete the retired root key. Not-found counts as deleted.
async fn retire_key(client: &dyn ControlPlane, key_id: &str) -> bool {
	match client.delete_key(key_id).await {
		Ok(()) => true,
		Err(e) if e.is_not_found() => true,
		Err(e) => {
			tracing::warn!(key_id, error = %e, "failed to delete retired root key");
			false
		}
	}
}

/// Delete a root key minted by a rotation that did not complete.
async fn discard_key(client: &dyn ControlPlane, key_id: &str) {
	if let Err(e) = client.delete_key(key_id).await {
		tracing::warn!(key_id, error = %e, "failed to delete unused root key");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use b2keys_control_plane::testing::MemoryControlPlane;
	use b2keys_storage::MemoryStorage;

	async fn coordinator() -> (MemoryControlPlane, RotationCoordinator) {
		let plane = MemoryControlPlane::new();
		let coordinator = RotationCoordinator::new(
			Arc::new(RootCredentialHolder::new()),
			RootConfigStore::new(Arc::new(MemoryStorage::new())),
			Arc::new(plane.clone()),
			"b2keys-root-".to_string(),
			Duration::from_millis(50),
		);
		(plane, coordinator)
	}

	#[tokio::test]
	async fn client_without_config_is_not_configured() {
		let (_plane, coordinator) = coordinator().await;
		assert!(matches!(
			coordinator.client().await.unwrap_err(),
			EngineError::NotConfigured
		));
		assert!(coordinator.activate_stored().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn install_rejects_bad_secret_as_invalid_config() {
		let (plane, coordinator) = coordinator().await;
		plane.seed_root_key("005root", "K005root").await;

		let err = coordinator
			.install(RootCredential::new("005root", "wrong"))
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::InvalidConfig(_)));
		assert!(coordinator.config.load().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn retired_key_kept_while_old_client_in_use() {
		let (plane, coordinator) = coordinator().await;
		let root = plane.seed_root_key("005root", "K005root").await;
		coordinator.install(root).await.unwrap();

		let held = coordinator.client().await.unwrap();
		let outcome = coordinator.rotate(None).await.unwrap();
		assert!(!outcome.old_key_deleted);
		assert!(plane.key("005root").await.is_some());
		drop(held);

		let outcome = coordinator.rotate(None).await.unwrap();
		assert!(outcome.old_key_deleted);
	}

	#[tokio::test]
	async fn rotate_mints_with_root_capabilities_and_retires_old_key() {
		let (plane, coordinator) = coordinator().await;
		let root = plane.seed_root_key("005root", "K005root").await;
		coordinator.install(root).await.unwrap();

		let outcome = coordinator.rotate(None).await.unwrap();
		assert_eq!(outcome.retired_key_id, "005root");
		assert!(outcome.old_key_deleted);
		assert!(plane.key("005root").await.is_none());

		let minted = plane.key(&outcome.new_key_id).await.unwrap();
		assert!(minted.key_name.starts_with("b2keys-root-"));
		assert_eq!(minted.minted_by.as_deref(), Some("005root"));

		let stored = coordinator.config.load().await.unwrap().unwrap();
		assert_eq!(stored.credential.key_id, outcome.new_key_id);
	}
}
