// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage configuration.

use serde::Deserialize;

const DEFAULT_URL: &str = "sqlite:./b2keys.db";

/// Storage configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct StorageConfig {
	/// `memory:` or a `sqlite:` URL.
	pub url: String,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_URL.to_string(),
		}
	}
}

/// Storage configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
}

impl StorageConfigLayer {
	pub fn merge(&mut self, other: StorageConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> StorageConfig {
		StorageConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_url() {
		let config = StorageConfigLayer::default().finalize();
		assert_eq!(config.url, "sqlite:./b2keys.db");
	}

	#[test]
	fn test_custom_url() {
		let layer = StorageConfigLayer {
			url: Some("memory:".to_string()),
		};
		assert_eq!(layer.finalize().url, "memory:");
	}
}
