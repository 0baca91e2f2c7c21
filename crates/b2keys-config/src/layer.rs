// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{ControlPlaneConfigLayer, LoggingConfigLayer, StorageConfigLayer};

/// Configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct B2keysConfigLayer {
	#[serde(default)]
	pub control_plane: Option<ControlPlaneConfigLayer>,
	#[serde(default)]
	pub storage: Option<StorageConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl B2keysConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: B2keysConfigLayer) {
		merge_option(
			&mut self.control_plane,
			other.control_plane,
			ControlPlaneConfigLayer::merge,
		);
		merge_option(&mut self.storage, other.storage, StorageConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T>(base: &mut Option<T>, other: Option<T>, merge_fn: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge_fn(b, o),
		(None, Some(o)) => *base = Some(o),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_fills_missing_sections() {
		let mut base = B2keysConfigLayer::default();
		base.merge(B2keysConfigLayer {
			storage: Some(StorageConfigLayer {
				url: Some("memory:".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(
			base.storage.and_then(|s| s.url).as_deref(),
			Some("memory:")
		);
		assert!(base.control_plane.is_none());
	}

	#[test]
	fn test_parse_full_toml() {
		let layer: B2keysConfigLayer = toml::from_str(
			r#"
			[control_plane]
			api_url = "http://localhost:9000"
			request_timeout_secs = 5

			[storage]
			url = "sqlite:/var/lib/b2keys/b2keys.db"

			[logging]
			level = "debug"
			"#,
		)
		.unwrap();

		let cp = layer.control_plane.unwrap();
		assert_eq!(cp.api_url.as_deref(), Some("http://localhost:9000"));
		assert_eq!(cp.request_timeout_secs, Some(5));
		assert_eq!(
			layer.storage.unwrap().url.as_deref(),
			Some("sqlite:/var/lib/b2keys/b2keys.db")
		);
		assert_eq!(layer.logging.unwrap().level.as_deref(), Some("debug"));
	}
}
