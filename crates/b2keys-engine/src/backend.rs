// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The engine's administrative surface.

use std::sync::Arc;
use std::time::Duration;

use b2keys_common_secret::SecretString;
use b2keys_control_plane::{ControlPlaneConnector, RootCredential};
use b2keys_storage::Storage;

use crate::error::{EngineError, Result};
use crate::holder::RootCredentialHolder;
use crate::issuer::{IssuedKey, KeyIssuer, LeaseData};
use crate::revoker::{LeaseRevoker, Revocation};
use crate::role::{Role, RoleStore};
use crate::root_config::{RootConfigStore, RootConfigView};
use crate::rotation::{RotationCoordinator, RotationOutcome};

pub const DEFAULT_KEY_NAME_PREFIX: &str = "b2keys-root-";

/// How long a rotation waits for in-flight calls on the retired root before
/// giving up on deleting it.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const HELP: &str = "\
The B2 secrets backend provisions API keys for the Backblaze B2 service.

Configure a root application key with `config`, define roles with `roles/<name>`,
then read `keys/<role>` to receive a short-lived key scoped by that role.
Issued keys are deleted from B2 when their lease expires or is revoked.
";

#[derive(Debug, Clone)]
pub struct BackendOptions {
	/// Name prefix for root keys minted during rotation.
	pub key_name_prefix: String,
	/// Upper bound on waiting for calls still using the retired root.
	pub drain_timeout: Duration,
}

impl Default for BackendOptions {
	fn default() -> Self {
		Self {
			key_name_prefix: DEFAULT_KEY_NAME_PREFIX.to_string(),
			drain_timeout: DEFAULT_DRAIN_TIMEOUT,
		}
	}
}

/// Credential engine over a storage backend and a control plane.
#[derive(Debug, Clone)]
pub struct Backend {
	roles: RoleStore,
	config: RootConfigStore,
	holder: Arc<RootCredentialHolder>,
	roots: Arc<RotationCoordinator>,
	issuer: KeyIssuer,
	revoker: LeaseRevoker,
}

impl Backend {
	/// Build a backend with nothing active. The stored root is activated on
	/// first use.
	pub fn new(
		storage: Arc<dyn Storage>,
		connector: Arc<dyn ControlPlaneConnector>,
		options: BackendOptions,
	) -> Self {
		let roles = RoleStore::new(Arc::clone(&storage));
		let config = RootConfigStore::new(storage);
		let holder = Arc::new(RootCredentialHolder::new());
		let roots = Arc::new(RotationCoordinator::new(
			Arc::clone(&holder),
			config.clone(),
			connector,
			options.key_name_prefix,
			options.drain_timeout,
		));

		Self {
			issuer: KeyIssuer::new(roles.clone(), Arc::clone(&roots)),
			revoker: LeaseRevoker::new(Arc::clone(&roots)),
			roles,
			config,
			holder,
			roots,
		}
	}

	/// Build a backend and activate the stored root credential, if any.
	///
	/// A stored credential the control plane cannot authorize right now is
	/// logged and retried on first use.
	#[tracing::instrument(skip_all)]
	pub async fn open(
		storage: Arc<dyn Storage>,
		connector: Arc<dyn ControlPlaneConnector>,
		options: BackendOptions,
	) -> Result<Self> {
		let backend = Self::new(storage, connector, options);

		match backend.roots.activate_stored().await {
			Ok(Some(view)) => tracing::info!(key_id = %view.key_id, "backend opened"),
			Ok(None) => tracing::info!("backend opened without root credential"),
			Err(EngineError::Storage(e)) => return Err(EngineError::Storage(e)),
			Err(e) => tracing::warn!(error = %e, "stored root credential not activated"),
		}

		Ok(backend)
	}

	pub fn help() -> &'static str {
		HELP
	}

	// Root configuration

	/// Verify, persist and activate a root credential.
	pub async fn write_config(
		&self,
		key_id: &str,
		application_key: SecretString,
	) -> Result<RootConfigView> {
		let credential = root_credential(key_id, application_key)?;
		self.roots.install(credential).await
	}

	/// Stored root configuration, without the secret.
	pub async fn read_config(&self) -> Result<RootConfigView> {
		self.config
			.load()
			.await?
			.map(|record| record.view())
			.ok_or(EngineError::NotConfigured)
	}

	/// Key id of the root credential currently used for remote calls.
	pub async fn active_key_id(&self) -> Option<String> {
		self.holder
			.current()
			.await
			.map(|active| active.credential.key_id.clone())
	}

	/// Rotate the root credential, minting a new one.
	pub async fn rotate(&self) -> Result<RotationOutcome> {
		self.roots.rotate(None).await
	}

	/// Rotate to an operator-supplied root credential.
	pub async fn rotate_to(
		&self,
		key_id: &str,
		application_key: SecretString,
	) -> Result<RotationOutcome> {
		let credential = root_credential(key_id, application_key)?;
		self.roots.rotate(Some(credential)).await
	}

	// Roles

	pub async fn list_roles(&self) -> Result<Vec<String>> {
		self.roles.list_roles().await
	}

	pub async fn get_role(&self, name: &str) -> Result<Role> {
		self.roles.get_role(name).await
	}

	pub async fn put_role(&self, name: &str, role: Role) -> Result<Role> {
		self.roles.put_role(name, role).await
	}

	pub async fn delete_role(&self, name: &str) -> Result<()> {
		self.roles.delete_role(name).await
	}

	pub async fn role_exists(&self, name: &str) -> Result<bool> {
		self.roles.role_exists(name).await
	}

	// Keys

	pub async fn issue_key(&self, role: &str, ttl: Option<Duration>) -> Result<IssuedKey> {
		self.issuer.issue(role, ttl).await
	}

	pub async fn revoke_key(&self, key_id: &str) -> Result<Revocation> {
		self.revoker.revoke(key_id).await
	}

	/// Lease expiry callback. The role named in the lease is not consulted.
	pub async fn revoke_lease(&self, lease: &LeaseData) -> Result<Revocation> {
		self.revoker.revoke(&lease.key_id).await
	}
}

fn root_credential(key_id: &str, application_key: SecretString) -> Result<RootCredential> {
	let key_id = key_id.trim();
	if key_id.is_empty() {
		return Err(EngineError::InvalidConfig("key_id must not be empty".to_string()));
	}
	if application_key.expose().trim().is_empty() {
		return Err(EngineError::InvalidConfig(
			"application_key must not be empty".to_string(),
		));
	}
	Ok(RootCredential::new(key_id, application_key))
}

#[cfg(test)]
mod tests {
	use super::*;
	use b2keys_control_plane::testing::MemoryControlPlane;
	use b2keys_storage::MemoryStorage;

	fn backend(plane: &MemoryControlPlane) -> Backend {
		Backend::new(
			Arc::new(MemoryStorage::new()),
			Arc::new(plane.clone()),
			BackendOptions::default(),
		)
	}

	#[tokio::test]
	async fn read_config_before_write_is_not_configured() {
		let backend = backend(&MemoryControlPlane::new());
		assert!(matches!(
			backend.read_config().await.unwrap_err(),
			EngineError::NotConfigured
		));
		assert!(backend.active_key_id().await.is_none());
	}

	#[tokio::test]
	async fn write_config_rejects_empty_fields() {
		let backend = backend(&MemoryControlPlane::new());
		assert!(matches!(
			backend.write_config(" ", "K005".into()).await.unwrap_err(),
			EngineError::InvalidConfig(_)
		));
		assert!(matches!(
			backend.write_config("005root", "".into()).await.unwrap_err(),
			EngineError::InvalidConfig(_)
		));
	}

	#[tokio::test]
	async fn write_then_read_config_hides_secret() {
		let plane = MemoryControlPlane::new();
		plane.seed_root_key("005root", "K005root").await;
		let backend = backend(&plane);

		let written = backend.write_config("005root", "K005root".into()).await.unwrap();
		let read = backend.read_config().await.unwrap();
		assert_eq!(written, read);
		assert_eq!(read.key_id, "005root");
		assert!(!serde_json::to_string(&read).unwrap().contains("K005root"));
		assert_eq!(backend.active_key_id().await.as_deref(), Some("005root"));
	}

	#[test]
	fn help_mentions_b2() {
		assert!(Backend::help().starts_with("The B2 secrets backend provisions API keys"));
	}
}
