// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dynamic B2 application key engine.
//!
//! Administrators define [`Role`]s; each issuance mints a scoped, short-lived
//! application key through the active root credential and returns it with
//! lease metadata. The host revokes the key on lease expiry through
//! [`Backend::revoke_lease`].
//!
//! # Components
//!
//! - [`RoleStore`]: durable role CRUD under `roles/<name>`
//! - [`RootCredentialHolder`]: the active root credential and its client
//! - [`RotationCoordinator`]: installs and rotates the root credential
//! - [`KeyIssuer`]: mints keys from roles
//! - [`LeaseRevoker`]: deletes issued keys, tolerating already-deleted ones
//!
//! [`Backend`] ties them together over a [`Storage`](b2keys_storage::Storage)
//! and a [`ControlPlaneConnector`](b2keys_control_plane::ControlPlaneConnector).

pub mod backend;
pub mod error;
pub mod holder;
pub mod issuer;
pub mod revoker;
pub mod role;
pub mod root_config;
pub mod rotation;

pub use backend::{Backend, BackendOptions, DEFAULT_DRAIN_TIMEOUT, DEFAULT_KEY_NAME_PREFIX};
pub use error::{EngineError, ErrorKind, Result, RotationStage};
pub use holder::{ActiveRoot, RootCredentialHolder};
pub use issuer::{effective_ttl, key_name, IssuedKey, KeyIssuer, Lease, LeaseData, SecretData};
pub use revoker::{LeaseRevoker, Revocation};
pub use role::{validate_role_name, Role, RoleStore};
pub use root_config::RootConfigView;
pub use rotation::{RotationCoordinator, RotationOutcome};
