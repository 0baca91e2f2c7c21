// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::B2keysConfigLayer;
use crate::sections::{ControlPlaneConfigLayer, LoggingConfigLayer, StorageConfigLayer};

/// Default system-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/b2keys/b2keys.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<B2keysConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<B2keysConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(B2keysConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<B2keysConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(B2keysConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: B2keysConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: B2KEYS_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<B2keysConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(B2keysConfigLayer {
			control_plane: Some(load_control_plane_from_env()?),
			storage: Some(load_storage_from_env()),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_control_plane_from_env() -> Result<ControlPlaneConfigLayer, ConfigError> {
	Ok(ControlPlaneConfigLayer {
		api_url: env_var("B2KEYS_CONTROL_PLANE_API_URL"),
		request_timeout_secs: env_u64("B2KEYS_CONTROL_PLANE_REQUEST_TIMEOUT_SECS")?,
		key_name_prefix: env_var("B2KEYS_CONTROL_PLANE_KEY_NAME_PREFIX"),
	})
}

fn load_storage_from_env() -> StorageConfigLayer {
	StorageConfigLayer {
		url: env_var("B2KEYS_STORAGE_URL"),
	}
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("B2KEYS_LOGGING_LEVEL"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.control_plane.is_none());
		assert!(layer.storage.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let source = TomlSource::new("/nonexistent/b2keys.toml");
		let layer = source.load().unwrap();
		assert!(layer.storage.is_none());
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[storage\nurl = 1").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_u64_rejects_garbage() {
		std::env::set_var("B2KEYS_TEST_SOURCES_U64", "soon");
		let err = env_u64("B2KEYS_TEST_SOURCES_U64").unwrap_err();
		assert!(err.to_string().contains("B2KEYS_TEST_SOURCES_U64"));
		std::env::remove_var("B2KEYS_TEST_SOURCES_U64");
	}

	#[test]
	fn test_env_var_ignores_empty() {
		std::env::set_var("B2KEYS_TEST_SOURCES_EMPTY", "");
		assert!(env_var("B2KEYS_TEST_SOURCES_EMPTY").is_none());
		std::env::remove_var("B2KEYS_TEST_SOURCES_EMPTY");
	}
}
