// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Roles and the policy store.
//!
//! A [`Role`] is the administrator-defined policy child keys are minted from.
//! Roles are stored as JSON under `roles/<name>` and always replaced whole.

use std::sync::Arc;
use std::time::Duration;

use b2keys_control_plane::CapabilitySet;
use b2keys_storage::{to_json_bytes, Storage};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub(crate) const ROLE_PREFIX: &str = "roles/";

/// Named policy for issued keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	/// Capabilities granted to every key issued under this role. Never empty.
	pub capabilities: CapabilitySet,
	/// Bucket name restriction; `None` issues account-wide keys.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bucket: Option<String>,
	/// File name prefix restriction within `bucket`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name_prefix: Option<String>,
	#[serde(default, with = "ttl_secs", skip_serializing_if = "Option::is_none")]
	pub default_ttl: Option<Duration>,
	#[serde(default, with = "ttl_secs", skip_serializing_if = "Option::is_none")]
	pub max_ttl: Option<Duration>,
}

impl Role {
	pub fn new(capabilities: CapabilitySet) -> Self {
		Self {
			capabilities,
			bucket: None,
			name_prefix: None,
			default_ttl: None,
			max_ttl: None,
		}
	}

	pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
		self.bucket = Some(bucket.into());
		self
	}

	pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.name_prefix = Some(prefix.into());
		self
	}

	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = Some(ttl);
		self
	}

	pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
		self.max_ttl = Some(ttl);
		self
	}

	/// Trim restrictions and drop the ones left empty.
	fn normalized(mut self) -> Self {
		self.bucket = trimmed(self.bucket);
		self.name_prefix = trimmed(self.name_prefix);
		self
	}

	/// Check the role's invariants. `name` is only used in the error.
	pub fn validate(&self, name: &str) -> Result<()> {
		if self.capabilities.is_empty() {
			return Err(EngineError::invalid_role(name, "capabilities must not be empty"));
		}

		if self.name_prefix.is_some() && self.bucket.is_none() {
			return Err(EngineError::invalid_role(
				name,
				"name_prefix requires a bucket restriction",
			));
		}

		for (field, ttl) in [("default_ttl", self.default_ttl), ("max_ttl", self.max_ttl)] {
			if let Some(ttl) = ttl {
				if ttl.as_secs() == 0 || ttl.subsec_nanos() != 0 {
					return Err(EngineError::invalid_role(
						name,
						format!("{field} must be a whole number of seconds, at least 1"),
					));
				}
			}
		}

		if let (Some(default_ttl), Some(max_ttl)) = (self.default_ttl, self.max_ttl) {
			if default_ttl > max_ttl {
				return Err(EngineError::invalid_role(
					name,
					format!(
						"default_ttl ({}s) exceeds max_ttl ({}s)",
						default_ttl.as_secs(),
						max_ttl.as_secs()
					),
				));
			}
		}

		Ok(())
	}
}

fn trimmed(value: Option<String>) -> Option<String> {
	value
		.map(|v| v.trim().to_string())
		.filter(|v| !v.is_empty())
}

/// Check a role name: ASCII alphanumerics, `_`, `-` and `.`, starting and
/// ending with an alphanumeric or `_`.
pub fn validate_role_name(name: &str) -> Result<()> {
	let edge_ok = |c: char| c.is_ascii_alphanumeric() || c == '_';
	let body_ok = |c: char| edge_ok(c) || c == '-' || c == '.';

	let (Some(first), Some(last)) = (name.chars().next(), name.chars().last()) else {
		return Err(EngineError::invalid_role(name, "role name must not be empty"));
	};

	if !edge_ok(first) || !edge_ok(last) || !name.chars().all(body_ok) {
		return Err(EngineError::invalid_role(
			name,
			"role name may only contain letters, digits, '_', '-' and '.', and must start and end with a letter, digit or '_'",
		));
	}

	Ok(())
}

/// Durable CRUD over roles.
#[derive(Debug, Clone)]
pub struct RoleStore {
	storage: Arc<dyn Storage>,
}

impl RoleStore {
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		Self { storage }
	}

	/// All role names in order. Empty when none exist.
	#[tracing::instrument(skip(self))]
	pub async fn list_roles(&self) -> Result<Vec<String>> {
		let names: Vec<String> = self
			.storage
			.list(ROLE_PREFIX)
			.await?
			.into_iter()
			.filter(|name| !name.ends_with('/'))
			.collect();

		tracing::debug!(count = names.len(), "listed roles");
		Ok(names)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_role(&self, name: &str) -> Result<Role> {
		self.find_role(name)
			.await?
			.ok_or_else(|| EngineError::RoleNotFound {
				role: name.to_string(),
			})
	}

	/// Validate and store `role` under `name`, replacing any existing role.
	///
	/// Returns the role as stored, with restrictions trimmed.
	#[tracing::instrument(skip(self, role))]
	pub async fn put_role(&self, name: &str, role: Role) -> Result<Role> {
		validate_role_name(name)?;
		let role = role.normalized();
		role.validate(name)?;

		let key = role_key(name);
		let version = self.storage.put(&key, to_json_bytes(&key, &role)?).await?;

		tracing::info!(version, "role written");
		Ok(role)
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_role(&self, name: &str) -> Result<()> {
		let existed = validate_role_name(name).is_ok() && self.storage.delete(&role_key(name)).await?;
		if !existed {
			return Err(EngineError::RoleNotFound {
				role: name.to_string(),
			});
		}

		tracing::info!("role deleted");
		Ok(())
	}

	pub async fn role_exists(&self, name: &str) -> Result<bool> {
		Ok(self.find_role(name).await?.is_some())
	}

	async fn find_role(&self, name: &str) -> Result<Option<Role>> {
		if validate_role_name(name).is_err() {
			return Ok(None);
		}

		match self.storage.get(&role_key(name)).await? {
			Some(entry) => Ok(Some(entry.decode_json()?)),
			None => Ok(None),
		}
	}
}

fn role_key(name: &str) -> String {
	format!("{ROLE_PREFIX}{name}")
}

/// `Option<Duration>` as whole seconds.
pub(crate) mod ttl_secs {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(ttl: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match ttl {
			Some(ttl) => serializer.serialize_some(&ttl.as_secs()),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
	}
}
