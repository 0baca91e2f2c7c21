// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The active root credential and the client built from it.

use std::sync::Arc;

use b2keys_control_plane::{ControlPlane, RootCredential};
use tokio::sync::RwLock;

/// A root credential together with the client authorized with it.
#[derive(Debug)]
pub struct ActiveRoot {
	pub credential: RootCredential,
	pub client: Arc<dyn ControlPlane>,
}

/// Holds the one active root.
///
/// Readers copy the `Arc` out and release the lock before any remote call;
/// the write lock is only taken inside [`swap`](Self::swap).
#[derive(Debug, Default)]
pub struct RootCredentialHolder {
	active: RwLock<Option<Arc<ActiveRoot>>>,
}

impl RootCredentialHolder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of the active root, if any.
	pub async fn current(&self) -> Option<Arc<ActiveRoot>> {
		self.active.read().await.clone()
	}

	/// Snapshot of the active client, if any.
	pub async fn current_client(&self) -> Option<Arc<dyn ControlPlane>> {
		self.active
			.read()
			.await
			.as_ref()
			.map(|active| Arc::clone(&active.client))
	}

	/// Replace the active root wholesale, returning the previous one.
	pub async fn swap(&self, next: ActiveRoot) -> Option<Arc<ActiveRoot>> {
		let next = Arc::new(next);
		let mut guard = self.active.write().await;
		let previous = guard.replace(next);
		drop(guard);

		tracing::debug!("active root swapped");
		previous
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use b2keys_control_plane::testing::MemoryControlPlane;
	use b2keys_control_plane::ControlPlaneConnector;

	async fn active(plane: &MemoryControlPlane, key_id: &str) -> ActiveRoot {
		let credential = plane.seed_root_key(key_id, "K005secret").await;
		let client = plane.connect(&credential).await.unwrap();
		ActiveRoot { credential, client }
	}

	#[tokio::test]
	async fn empty_until_first_swap() {
		let holder = RootCredentialHolder::new();
		assert!(holder.current().await.is_none());
		assert!(holder.current_client().await.is_none());
	}

	#[tokio::test]
	async fn swap_returns_previous_and_snapshots_survive() {
		let plane = MemoryControlPlane::new();
		let holder = RootCredentialHolder::new();

		assert!(holder.swap(active(&plane, "005old").await).await.is_none());
		let snapshot = holder.current().await.unwrap();

		let previous = holder.swap(active(&plane, "005new").await).await.unwrap();
		assert_eq!(previous.credential.key_id, "005old");
		assert_eq!(snapshot.credential.key_id, "005old");
		assert_eq!(holder.current().await.unwrap().credential.key_id, "005new");
	}
}
