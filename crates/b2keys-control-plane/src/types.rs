// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control plane data types.
//!
//! # Overview
//!
//! - **Capabilities**: the operation tags a B2 application key may carry ([`Capability`])
//! - **Root credential**: the account-level key every control plane call is made with ([`RootCredential`])
//! - **Key requests/results**: what the engine asks for and what the remote side minted
//!   ([`KeyRequest`], [`CreatedKey`])

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use b2keys_common_secret::SecretString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Capabilities
// =============================================================================

macro_rules! define_capabilities {
	($($variant:ident => $wire:literal),+ $(,)?) => {
		/// An operation an application key is allowed to perform.
		///
		/// Serialized with the remote API's own camelCase names.
		#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		pub enum Capability {
			$(
				#[serde(rename = $wire)]
				$variant,
			)+
		}

		impl Capability {
			/// Every capability the remote API knows about.
			pub fn all() -> &'static [Capability] {
				&[$(Capability::$variant),+]
			}

			/// The wire name, e.g. `readFiles`.
			pub fn as_str(&self) -> &'static str {
				match self {
					$(Capability::$variant => $wire,)+
				}
			}
		}

		impl FromStr for Capability {
			type Err = UnknownCapability;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s.trim() {
					$($wire => Ok(Capability::$variant),)+
					other => Err(UnknownCapability(other.to_string())),
				}
			}
		}
	};
}

define_capabilities! {
	ListKeys => "listKeys",
	WriteKeys => "writeKeys",
	DeleteKeys => "deleteKeys",
	ListBuckets => "listBuckets",
	ListAllBucketNames => "listAllBucketNames",
	ReadBuckets => "readBuckets",
	WriteBuckets => "writeBuckets",
	DeleteBuckets => "deleteBuckets",
	ReadBucketRetentions => "readBucketRetentions",
	WriteBucketRetentions => "writeBucketRetentions",
	ReadBucketEncryption => "readBucketEncryption",
	WriteBucketEncryption => "writeBucketEncryption",
	ListFiles => "listFiles",
	ReadFiles => "readFiles",
	ShareFiles => "shareFiles",
	WriteFiles => "writeFiles",
	DeleteFiles => "deleteFiles",
	ReadFileLegalHolds => "readFileLegalHolds",
	WriteFileLegalHolds => "writeFileLegalHolds",
	ReadFileRetentions => "readFileRetentions",
	WriteFileRetentions => "writeFileRetentions",
	BypassGovernance => "bypassGovernance",
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Returned when parsing a capability name the remote API does not define.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability: {0:?}")]
pub struct UnknownCapability(pub String);

/// An ordered, de-duplicated set of capabilities.
pub type CapabilitySet = BTreeSet<Capability>;

/// Parse a comma separated capability list such as `readFiles,listFiles`.
///
/// Empty segments are skipped; the result may be empty.
pub fn parse_capabilities(input: &str) -> Result<CapabilitySet, UnknownCapability> {
	input
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(Capability::from_str)
		.collect()
}

// =============================================================================
// Root credential
// =============================================================================

/// The long-lived account-level key used to authenticate control plane calls.
///
/// Replaced wholesale on rotation, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCredential {
	/// Application key id (the public half).
	pub key_id: String,
	/// Application key secret.
	#[serde(with = "b2keys_common_secret::serde_expose")]
	pub application_key: SecretString,
	pub created_at: DateTime<Utc>,
}

impl RootCredential {
	pub fn new(key_id: impl Into<String>, application_key: impl Into<SecretString>) -> Self {
		Self {
			key_id: key_id.into(),
			application_key: application_key.into(),
			created_at: Utc::now(),
		}
	}
}

/// Account details returned by authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
	pub account_id: String,
	/// Capabilities of the key used to authorize. A rotated root key is
	/// minted with exactly this set.
	pub capabilities: CapabilitySet,
	pub api_url: String,
}

// =============================================================================
// Key requests
// =============================================================================

/// A scoped child key to mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
	pub key_name: String,
	pub capabilities: CapabilitySet,
	/// Bucket name; `None` requests an account-wide key.
	pub bucket: Option<String>,
	/// File name prefix restriction; only sent together with a bucket.
	pub name_prefix: Option<String>,
	/// Key lifetime; `None` leaves the remote default in place.
	pub valid_duration: Option<Duration>,
}

/// A key the control plane minted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedKey {
	pub key_id: String,
	pub application_key: SecretString,
	pub key_name: String,
	pub capabilities: CapabilitySet,
	pub bucket_id: Option<String>,
	pub name_prefix: Option<String>,
	pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn capability_wire_names_roundtrip_through_serde() {
		for cap in Capability::all() {
			let json = serde_json::to_string(cap).unwrap();
			assert_eq!(json, format!("\"{}\"", cap.as_str()));
			let back: Capability = serde_json::from_str(&json).unwrap();
			assert_eq!(&back, cap);
		}
	}

	#[test]
	fn parse_capabilities_accepts_comma_list() {
		let caps = parse_capabilities("readFiles, listFiles,,readFiles").unwrap();
		assert_eq!(
			caps.into_iter().collect::<Vec<_>>(),
			vec![Capability::ListFiles, Capability::ReadFiles]
		);
	}

	#[test]
	fn parse_capabilities_rejects_unknown() {
		let err = parse_capabilities("readFiles,launchMissiles").unwrap_err();
		assert_eq!(err, UnknownCapability("launchMissiles".to_string()));
	}

	#[test]
	fn root_credential_persists_secret_but_debug_hides_it() {
		let cred = RootCredential::new("0051234", "K005secret");
		let json = serde_json::to_string(&cred).unwrap();
		assert!(json.contains("K005secret"));
		assert!(!format!("{cred:?}").contains("K005secret"));

		let back: RootCredential = serde_json::from_str(&json).unwrap();
		assert_eq!(back, cred);
	}

	proptest! {
		#[test]
		fn from_str_matches_as_str(idx in 0usize..Capability::all().len()) {
			let cap = Capability::all()[idx];
			prop_assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
		}
	}
}
