// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP client builder with a consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Creates a client builder carrying the b2keys User-Agent.
///
/// # Example
/// ```ignore
/// let client = b2keys_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a client with the given request timeout.
///
/// Fails only if the TLS backend cannot be initialised.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	let client = builder().timeout(timeout).build()?;
	tracing::trace!(timeout_secs = timeout.as_secs(), "HTTP client built");
	Ok(client)
}

/// Returns the User-Agent string: `b2keys/{version}/{os}-{arch}`.
pub fn user_agent() -> String {
	format!(
		"b2keys/{}/{}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_three_segments() {
		let ua = user_agent();
		let parts: Vec<&str> = ua.split('/').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "b2keys");
		assert_eq!(parts[1], env!("CARGO_PKG_VERSION"));
	}

	#[test]
	fn client_with_timeout_builds() {
		assert!(new_client_with_timeout(Duration::from_secs(5)).is_ok());
	}
}
