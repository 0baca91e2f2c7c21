// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control plane traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AccountInfo, CreatedKey, KeyRequest, RootCredential};

/// An authenticated handle to the remote key-management API.
///
/// Handles are immutable once built; a new root credential means a new
/// handle. Implementations must be cheap to share behind an `Arc`.
#[async_trait]
pub trait ControlPlane: Send + Sync + std::fmt::Debug {
	/// Account the handle was authorized against.
	fn account(&self) -> &AccountInfo;

	/// Mint a scoped application key.
	async fn create_key(&self, request: &KeyRequest) -> Result<CreatedKey>;

	/// Delete an application key by id.
	///
	/// Returns [`ControlPlaneError::NotFound`](crate::ControlPlaneError::NotFound)
	/// when no such key exists.
	async fn delete_key(&self, key_id: &str) -> Result<()>;
}

/// Builds authenticated [`ControlPlane`] handles from root credentials.
#[async_trait]
pub trait ControlPlaneConnector: Send + Sync + std::fmt::Debug {
	async fn connect(&self, credential: &RootCredential) -> Result<Arc<dyn ControlPlane>>;
}
