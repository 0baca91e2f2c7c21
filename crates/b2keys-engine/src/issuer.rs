// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key issuance.

use std::sync::Arc;
use std::time::Duration;

use b2keys_common_secret::SecretString;
use b2keys_control_plane::{CapabilitySet, KeyRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::role::{ttl_secs, Role, RoleStore};
use crate::rotation::RotationCoordinator;

/// Longest key name the control plane accepts.
pub const MAX_KEY_NAME_LEN: usize = 100;

const KEY_NAME_SUFFIX_LEN: usize = 8;

/// One outstanding child key.
#[derive(Debug, Clone)]
pub struct IssuedKey {
	pub role: String,
	pub key_id: String,
	pub application_key: SecretString,
	pub key_name: String,
	pub capabilities: CapabilitySet,
	pub bucket: Option<String>,
	pub name_prefix: Option<String>,
	pub issued_at: DateTime<Utc>,
	/// Lifetime actually requested from the control plane. `None` means the
	/// remote default applies.
	pub ttl: Option<Duration>,
	pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedKey {
	/// Payload handed to the caller. Contains the secret.
	pub fn secret_data(&self) -> SecretData {
		SecretData {
			key_id: self.key_id.clone(),
			application_key: self.application_key.clone(),
			key_name: self.key_name.clone(),
			capabilities: self.capabilities.clone(),
			bucket: self.bucket.clone(),
			name_prefix: self.name_prefix.clone(),
		}
	}

	/// What the host keeps to revoke this key later.
	pub fn lease(&self) -> Lease {
		Lease {
			data: LeaseData {
				role: self.role.clone(),
				key_id: self.key_id.clone(),
			},
			ttl: self.ttl,
			issued_at: self.issued_at,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretData {
	pub key_id: String,
	#[serde(with = "b2keys_common_secret::serde_expose")]
	pub application_key: SecretString,
	pub key_name: String,
	pub capabilities: CapabilitySet,
	pub bucket: Option<String>,
	pub name_prefix: Option<String>,
}

/// Lease metadata returned to the host on issuance and handed back on expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseData {
	pub role: String,
	pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lease {
	#[serde(flatten)]
	pub data: LeaseData,
	#[serde(with = "ttl_secs")]
	pub ttl: Option<Duration>,
	pub issued_at: DateTime<Utc>,
}

/// Lifetime to request for a key issued under `role`.
///
/// An override is truncated to whole seconds and clamped to
/// `[1s, role.max_ttl]`. Without one, the role's default applies, then its
/// maximum, then nothing.
pub fn effective_ttl(role: &Role, requested: Option<Duration>) -> Option<Duration> {
	match requested {
		Some(requested) => {
			let ttl = Duration::from_secs(requested.as_secs().max(1));
			Some(match role.max_ttl {
				Some(max_ttl) => ttl.min(max_ttl),
				None => ttl,
			})
		}
		None => role.default_ttl.or(role.max_ttl),
	}
}

/// Remote key name for a key issued under `role`: `<role>-<unix secs>-<suffix>`.
///
/// Characters the control plane rejects in names become `-`; the role part is
/// shortened to fit [`MAX_KEY_NAME_LEN`].
pub fn key_name(role: &str, now: DateTime<Utc>) -> String {
	let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
		.take(KEY_NAME_SUFFIX_LEN)
		.collect();
	let tail = format!("-{}-{suffix}", now.timestamp());

	let role: String = role
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
		.take(MAX_KEY_NAME_LEN.saturating_sub(tail.len()))
		.collect();

	format!("{role}{tail}")
}

/// Mints child keys from roles.
#[derive(Debug, Clone)]
pub struct KeyIssuer {
	roles: RoleStore,
	roots: Arc<RotationCoordinator>,
}

impl KeyIssuer {
	pub(crate) fn new(roles: RoleStore, roots: Arc<RotationCoordinator>) -> Self {
		Self { roles, roots }
	}

	#[tracing::instrument(skip(self))]
	pub async fn issue(&self, role_name: &str, ttl: Option<Duration>) -> Result<IssuedKey> {
		let role = self.roles.get_role(role_name).await?;
		let ttl = effective_ttl(&role, ttl);

		let request = KeyRequest {
			key_name: key_name(role_name, Utc::now()),
			capabilities: role.capabilities.clone(),
			bucket: role.bucket.clone(),
			name_prefix: role.name_prefix.clone(),
			valid_duration: ttl,
		};

		let client = self.roots.client().await?;
		let created = client.create_key(&request).await.map_err(|source| {
			tracing::error!(error = %source, "control plane rejected key creation");
			EngineError::IssuanceFailed {
				role: role_name.to_string(),
				source,
			}
		})?;

		let issued_at = Utc::now();
		let expires_at = created.expires_at.or_else(|| {
			ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok())
				.map(|ttl| issued_at + ttl)
		});

		tracing::info!(
			key_id = %created.key_id,
			ttl_secs = ttl.map(|t| t.as_secs()),
			"key issued"
		);

		Ok(IssuedKey {
			role: role_name.to_string(),
			key_id: created.key_id,
			application_key: created.application_key,
			key_name: created.key_name,
			capabilities: role.capabilities,
			bucket: role.bucket,
			name_prefix: role.name_prefix,
			issued_at,
			ttl,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use b2keys_control_plane::Capability;
	use proptest::prelude::*;

	fn role(default_ttl: Option<u64>, max_ttl: Option<u64>) -> Role {
		Role {
			capabilities: [Capability::ReadFiles].into_iter().collect(),
			bucket: None,
			name_prefix: None,
			default_ttl: default_ttl.map(Duration::from_secs),
			max_ttl: max_ttl.map(Duration::from_secs),
		}
	}

	#[test]
	fn default_ttl_used_without_override() {
		assert_eq!(
			effective_ttl(&role(Some(3600), Some(7200)), None),
			Some(Duration::from_secs(3600))
		);
	}

	#[test]
	fn max_ttl_used_when_no_default() {
		assert_eq!(
			effective_ttl(&role(None, Some(7200)), None),
			Some(Duration::from_secs(7200))
		);
	}

	#[test]
	fn no_ttl_when_role_has_none() {
		assert_eq!(effective_ttl(&role(None, None), None), None);
	}

	#[test]
	fn override_floor_is_one_second() {
		assert_eq!(
			effective_ttl(&role(None, Some(60)), Some(Duration::ZERO)),
			Some(Duration::from_secs(1))
		);
		assert_eq!(
			effective_ttl(&role(None, None), Some(Duration::from_millis(2500))),
			Some(Duration::from_secs(2))
		);
	}

	#[test]
	fn key_name_shape() {
		let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
		let name = key_name("team.reader_1", now);
		assert!(name.starts_with("team-reader-1-1700000000-"), "{name}");
		assert_eq!(name.len(), "team-reader-1-1700000000-".len() + KEY_NAME_SUFFIX_LEN);
	}

	#[test]
	fn key_name_is_truncated() {
		let long = "r".repeat(300);
		let name = key_name(&long, Utc::now());
		assert_eq!(name.len(), MAX_KEY_NAME_LEN);
	}

	#[test]
	fn lease_and_secret_data() {
		let issued = IssuedKey {
			role: "reader".to_string(),
			key_id: "005child".to_string(),
			application_key: "K005child".into(),
			key_name: "reader-1-abc".to_string(),
			capabilities: [Capability::ReadFiles].into_iter().collect(),
			bucket: Some("photos".to_string()),
			name_prefix: None,
			issued_at: Utc::now(),
			ttl: Some(Duration::from_secs(3600)),
			expires_at: None,
		};

		let lease = serde_json::to_value(issued.lease()).unwrap();
		assert_eq!(lease["role"], "reader");
		assert_eq!(lease["key_id"], "005child");
		assert_eq!(lease["ttl"], 3600);

		let secret = serde_json::to_string(&issued.secret_data()).unwrap();
		assert!(secret.contains("K005child"));
		assert!(!format!("{issued:?}").contains("K005child"));
	}

	proptest! {
		#[test]
		fn override_never_exceeds_max(max in 1u64..100_000, requested in 0u64..1_000_000) {
			let role = role(None, Some(max));
			let ttl = effective_ttl(&role, Some(Duration::from_secs(requested))).unwrap();
			prop_assert!(ttl <= Duration::from_secs(max));
			prop_assert!(ttl >= Duration::from_secs(1));
			if requested >= 1 && requested <= max {
				prop_assert_eq!(ttl, Duration::from_secs(requested));
			}
		}
	}
}
