// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for b2keys.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`B2KEYS_*`)
//!
//! # Usage
//!
//! ```ignore
//! use b2keys_config::load_config;
//!
//! let config = load_config()?;
//! println!("storage at {}", config.storage.url);
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::load_secret_env;
pub use error::ConfigError;
pub use layer::B2keysConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct B2keysConfig {
	pub control_plane: ControlPlaneConfig,
	pub storage: StorageConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`B2KEYS_*`)
/// 2. Config file (`/etc/b2keys/b2keys.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<B2keysConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<B2keysConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<B2keysConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = B2keysConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: B2keysConfigLayer) -> Result<B2keysConfig, ConfigError> {
	let control_plane = layer.control_plane.unwrap_or_default().finalize();
	let storage = layer.storage.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&control_plane)?;

	info!(
		api_url = %control_plane.api_url,
		request_timeout_secs = control_plane.request_timeout_secs,
		storage = %storage.url,
		"configuration loaded"
	);

	Ok(B2keysConfig {
		control_plane,
		storage,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(control_plane: &ControlPlaneConfig) -> Result<(), ConfigError> {
	if control_plane.request_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"control_plane.request_timeout_secs must be greater than zero".to_string(),
		));
	}

	if control_plane.api_url.is_empty() {
		return Err(ConfigError::Validation(
			"control_plane.api_url must not be empty".to_string(),
		));
	}

	Ok(())
}
