// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod control_plane;
mod logging;
mod storage;

pub use control_plane::{ControlPlaneConfig, ControlPlaneConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use storage::{StorageConfig, StorageConfigLayer};
