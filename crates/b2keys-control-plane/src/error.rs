// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the control plane client.

use thiserror::Error;

/// Errors returned by control plane calls.
///
/// Messages carry the remote error code and message only; request bodies,
/// authorization tokens and key material never end up here.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
	/// The addressed key (or other resource) does not exist remotely.
	#[error("Resource not found: {0}")]
	NotFound(String),

	/// The credential used for the call was rejected.
	#[error("Unauthorized: {0}")]
	Unauthorized(String),

	/// Bucket named in a key restriction does not exist in the account.
	#[error("Bucket not found: {0}")]
	BucketNotFound(String),

	/// Remote API returned an error status.
	#[error("Control plane error: {status} {code} - {message}")]
	Api {
		status: u16,
		code: String,
		message: String,
	},

	/// Network-level error during HTTP communication.
	#[error("Network error: {0}")]
	Network(#[source] reqwest::Error),

	/// Request timed out.
	#[error("Request timed out")]
	Timeout,

	/// Response could not be understood.
	#[error("Invalid response from control plane: {0}")]
	InvalidResponse(String),
}

impl ControlPlaneError {
	/// True when the remote side reports the target as already gone.
	pub fn is_not_found(&self) -> bool {
		matches!(self, ControlPlaneError::NotFound(_))
	}
}

impl From<reqwest::Error> for ControlPlaneError {
	fn from(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			ControlPlaneError::Timeout
		} else {
			ControlPlaneError::Network(e)
		}
	}
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;
