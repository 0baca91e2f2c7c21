// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for b2keys.
//!
//! Every outbound call to the storage control plane goes through a client
//! built here so requests carry the same User-Agent and timeout policy.
//! Requests are never retried here; a repeated key-mint request can create a
//! duplicate key on the remote side.

mod client;

pub use client::{builder, new_client_with_timeout, user_agent};
