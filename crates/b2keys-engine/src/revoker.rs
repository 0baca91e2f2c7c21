// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key revocation.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::rotation::RotationCoordinator;

/// How a successful revocation went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Revocation {
	Deleted,
	/// The control plane no longer knew the key.
	AlreadyAbsent,
}

/// Deletes issued keys through whichever client is active.
#[derive(Debug, Clone)]
pub struct LeaseRevoker {
	roots: Arc<RotationCoordinator>,
}

impl LeaseRevoker {
	pub(crate) fn new(roots: Arc<RotationCoordinator>) -> Self {
		Self { roots }
	}

	/// Delete `key_id`. A key the control plane reports as missing is a
	/// success. Failures are not retried here.
	#[tracing::instrument(skip(self))]
	pub async fn revoke(&self, key_id: &str) -> Result<Revocation> {
		let client = self.roots.client().await?;

		match client.delete_key(key_id).await {
			Ok(()) => {
				tracing::info!("key revoked");
				Ok(Revocation::Deleted)
			}
			Err(e) if e.is_not_found() => {
				tracing::warn!("key already absent, treating revoke as done");
				Ok(Revocation::AlreadyAbsent)
			}
			Err(source) => {
				tracing::error!(error = %source, "control plane rejected key deletion");
				Err(EngineError::RevocationFailed {
					key_id: key_id.to_string(),
					source,
				})
			}
		}
	}
}
