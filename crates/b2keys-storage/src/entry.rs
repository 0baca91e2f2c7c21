// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stored entries and JSON helpers.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, StorageError};

/// One stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
	pub key: String,
	pub value: Vec<u8>,
	/// Incremented on every write to `key`.
	pub version: u64,
}

impl StorageEntry {
	/// Decode the value as JSON.
	pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
		serde_json::from_slice(&self.value).map_err(|source| StorageError::Serialization {
			key: self.key.clone(),
			source,
		})
	}
}

/// Encode `value` as JSON for storing at `key`.
pub fn to_json_bytes<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>> {
	serde_json::to_vec(value).map_err(|source| StorageError::Serialization {
		key: key.to_string(),
		source,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Sample {
		name: String,
	}

	#[test]
	fn decode_reports_key_on_bad_json() {
		let entry = StorageEntry {
			key: "roles/broken".to_string(),
			value: b"not json".to_vec(),
			version: 1,
		};
		let err = entry.decode_json::<Sample>().unwrap_err();
		assert!(err.to_string().contains("roles/broken"));
	}

	#[test]
	fn encode_then_decode() {
		let bytes = to_json_bytes("roles/a", &Sample { name: "a".into() }).unwrap();
		let entry = StorageEntry {
			key: "roles/a".to_string(),
			value: bytes,
			version: 3,
		};
		assert_eq!(entry.decode_json::<Sample>().unwrap(), Sample { name: "a".into() });
	}
}
