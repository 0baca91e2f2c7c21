// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Serialization error at {key}: {source}")]
	Serialization {
		key: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("Invalid storage key: {0}")]
	InvalidKey(String),

	#[error("Invalid storage URL: {0}")]
	InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
