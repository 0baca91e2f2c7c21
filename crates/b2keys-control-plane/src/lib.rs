// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote control plane for B2 application keys.
//!
//! This crate provides:
//! - [`ControlPlane`] / [`ControlPlaneConnector`]: the seam between the
//!   credential engine and the remote key-management API
//! - [`B2Connector`] / [`B2Client`]: the Backblaze B2 native API binding
//! - `testing::MemoryControlPlane` (feature `testing`): an in-memory fake

pub mod b2;
pub mod client;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use b2::{B2Client, B2Connector, DEFAULT_API_URL};
pub use client::{ControlPlane, ControlPlaneConnector};
pub use error::{ControlPlaneError, Result};
pub use types::{
	parse_capabilities, AccountInfo, Capability, CapabilitySet, CreatedKey, KeyRequest,
	RootCredential, UnknownCapability,
};
