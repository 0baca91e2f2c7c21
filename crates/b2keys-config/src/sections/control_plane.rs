// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control plane (B2 native API) configuration section.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "https://api.backblazeb2.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KEY_NAME_PREFIX: &str = "b2keys-root-";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ControlPlaneConfigLayer {
	#[serde(default)]
	pub api_url: Option<String>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	/// Name prefix for root keys minted during rotation.
	#[serde(default)]
	pub key_name_prefix: Option<String>,
}

impl ControlPlaneConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.api_url.is_some() {
			self.api_url = other.api_url;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.key_name_prefix.is_some() {
			self.key_name_prefix = other.key_name_prefix;
		}
	}

	pub fn finalize(self) -> ControlPlaneConfig {
		ControlPlaneConfig {
			api_url: self
				.api_url
				.map(|url| url.trim_end_matches('/').to_string())
				.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
			request_timeout_secs: self
				.request_timeout_secs
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
			key_name_prefix: self
				.key_name_prefix
				.unwrap_or_else(|| DEFAULT_KEY_NAME_PREFIX.to_string()),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlPlaneConfig {
	pub api_url: String,
	pub request_timeout_secs: u64,
	pub key_name_prefix: String,
}

impl ControlPlaneConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}

impl Default for ControlPlaneConfig {
	fn default() -> Self {
		ControlPlaneConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ControlPlaneConfig::default();
		assert_eq!(config.api_url, "https://api.backblazeb2.com");
		assert_eq!(config.request_timeout(), Duration::from_secs(30));
		assert_eq!(config.key_name_prefix, "b2keys-root-");
	}

	#[test]
	fn test_trailing_slash_trimmed() {
		let layer = ControlPlaneConfigLayer {
			api_url: Some("http://127.0.0.1:9000/".to_string()),
			..Default::default()
		};
		assert_eq!(layer.finalize().api_url, "http://127.0.0.1:9000");
	}

	#[test]
	fn test_merge_preserves_base_when_none() {
		let mut base = ControlPlaneConfigLayer {
			request_timeout_secs: Some(5),
			..Default::default()
		};
		base.merge(ControlPlaneConfigLayer {
			api_url: Some("http://localhost".to_string()),
			..Default::default()
		});
		assert_eq!(base.request_timeout_secs, Some(5));
		assert_eq!(base.api_url.as_deref(), Some("http://localhost"));
	}

	#[test]
	fn test_deserialize_partial_toml() {
		let layer: ControlPlaneConfigLayer = toml::from_str("request_timeout_secs = 10").unwrap();
		assert_eq!(layer.request_timeout_secs, Some(10));
		assert!(layer.api_url.is_none());
	}
}
