// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Engine error taxonomy.

use std::fmt;

use b2keys_control_plane::ControlPlaneError;
use b2keys_storage::StorageError;
use thiserror::Error;

/// Boxed cause carried by [`EngineError::RotationFailed`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Step of a root rotation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStage {
	/// Minting the replacement root key.
	Mint,
	/// Writing the replacement to the `config` entry.
	Persist,
	/// Authorizing a client with the replacement.
	Connect,
}

impl RotationStage {
	pub fn as_str(&self) -> &'static str {
		match self {
			RotationStage::Mint => "mint",
			RotationStage::Persist => "persist",
			RotationStage::Connect => "connect",
		}
	}
}

impl fmt::Display for RotationStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("role not found: {role}")]
	RoleNotFound { role: String },

	#[error("invalid role {role:?}: {reason}")]
	InvalidRole { role: String, reason: String },

	#[error("failed to issue key for role {role}: {source}")]
	IssuanceFailed {
		role: String,
		#[source]
		source: ControlPlaneError,
	},

	#[error("failed to revoke key {key_id}: {source}")]
	RevocationFailed {
		key_id: String,
		#[source]
		source: ControlPlaneError,
	},

	#[error("root rotation failed at {stage} stage: {source}")]
	RotationFailed {
		stage: RotationStage,
		#[source]
		source: BoxError,
	},

	#[error("backend is not configured; write a root credential first")]
	NotConfigured,

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("control plane {operation} failed: {source}")]
	ControlPlane {
		operation: &'static str,
		#[source]
		source: ControlPlaneError,
	},

	#[error(transparent)]
	Storage(#[from] StorageError),
}

/// Stable, machine-readable error tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	RoleNotFound,
	InvalidRole,
	IssuanceFailed,
	RevocationFailed,
	RotationFailed,
	NotConfigured,
	InvalidConfig,
	ControlPlane,
	Storage,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::RoleNotFound => "role_not_found",
			ErrorKind::InvalidRole => "invalid_role",
			ErrorKind::IssuanceFailed => "issuance_failed",
			ErrorKind::RevocationFailed => "revocation_failed",
			ErrorKind::RotationFailed => "rotation_failed",
			ErrorKind::NotConfigured => "not_configured",
			ErrorKind::InvalidConfig => "invalid_config",
			ErrorKind::ControlPlane => "control_plane",
			ErrorKind::Storage => "storage",
		}
	}

	/// The caller asked for something that cannot succeed as stated; retrying
	/// the same request will not help.
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			ErrorKind::RoleNotFound
				| ErrorKind::InvalidRole
				| ErrorKind::InvalidConfig
				| ErrorKind::NotConfigured
		)
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl EngineError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			EngineError::RoleNotFound { .. } => ErrorKind::RoleNotFound,
			EngineError::InvalidRole { .. } => ErrorKind::InvalidRole,
			EngineError::IssuanceFailed { .. } => ErrorKind::IssuanceFailed,
			EngineError::RevocationFailed { .. } => ErrorKind::RevocationFailed,
			EngineError::RotationFailed { .. } => ErrorKind::RotationFailed,
			EngineError::NotConfigured => ErrorKind::NotConfigured,
			EngineError::InvalidConfig(_) => ErrorKind::InvalidConfig,
			EngineError::ControlPlane { .. } => ErrorKind::ControlPlane,
			EngineError::Storage(_) => ErrorKind::Storage,
		}
	}

	pub(crate) fn invalid_role(role: &str, reason: impl Into<String>) -> Self {
		EngineError::InvalidRole {
			role: role.to_string(),
			reason: reason.into(),
		}
	}

	pub(crate) fn rotation(stage: RotationStage, source: impl Into<BoxError>) -> Self {
		EngineError::RotationFailed {
			stage,
			source: source.into(),
		}
	}
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kinds_have_stable_tags() {
		let err = EngineError::RoleNotFound {
			role: "reader".to_string(),
		};
		assert_eq!(err.kind().as_str(), "role_not_found");
		assert!(err.kind().is_client_error());
		assert_eq!(err.to_string(), "role not found: reader");
	}

	#[test]
	fn remote_failures_are_not_client_errors() {
		let err = EngineError::IssuanceFailed {
			role: "reader".to_string(),
			source: ControlPlaneError::Timeout,
		};
		assert_eq!(err.kind(), ErrorKind::IssuanceFailed);
		assert!(!err.kind().is_client_error());
		assert!(err.to_string().contains("reader"));
	}

	#[test]
	fn rotation_failure_names_stage() {
		let err = EngineError::rotation(RotationStage::Mint, ControlPlaneError::Timeout);
		assert_eq!(err.kind().as_str(), "rotation_failed");
		assert!(err.to_string().contains("mint stage"));
		assert!(std::error::Error::source(&err).is_some());
	}
}
