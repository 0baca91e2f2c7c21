// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backblaze B2 native API implementation of the control plane.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use b2keys_common_secret::SecretString;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, instrument, trace};

use crate::client::{ControlPlane, ControlPlaneConnector};
use crate::error::{ControlPlaneError, Result};
use crate::types::{
	AccountInfo, Capability, CapabilitySet, CreatedKey, KeyRequest, RootCredential,
};

pub const DEFAULT_API_URL: &str = "https://api.backblazeb2.com";
const API_PREFIX: &str = "b2api/v2";

/// Connector that authorizes root credentials against the B2 native API.
#[derive(Debug, Clone)]
pub struct B2Connector {
	http_client: Client,
	api_url: String,
}

impl B2Connector {
	/// Creates a connector talking to `api_url` with the given request timeout.
	pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
		let http_client = b2keys_common_http::new_client_with_timeout(timeout)?;
		Ok(Self {
			http_client,
			api_url: api_url.into().trim_end_matches('/').to_string(),
		})
	}

	/// Creates a connector for the public B2 endpoint.
	pub fn with_defaults() -> Result<Self> {
		Self::new(DEFAULT_API_URL, Duration::from_secs(30))
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
	account_id: String,
	authorization_token: String,
	api_url: String,
	allowed: AllowedInfo,
}

#[derive(Debug, Deserialize)]
struct AllowedInfo {
	#[serde(default)]
	capabilities: Vec<String>,
}

#[async_trait]
impl ControlPlaneConnector for B2Connector {
	#[instrument(skip(self, credential), fields(key_id = %credential.key_id))]
	async fn connect(&self, credential: &RootCredential) -> Result<Arc<dyn ControlPlane>> {
		let url = format!("{}/{API_PREFIX}/b2_authorize_account", self.api_url);
		let basic = STANDARD.encode(format!(
			"{}:{}",
			credential.key_id,
			credential.application_key.expose()
		));

		debug!(url = %url, "Authorizing account");
		let response = self
			.http_client
			.get(&url)
			.header("Authorization", format!("Basic {basic}"))
			.send()
			.await?;

		let auth: AuthorizeResponse = decode_response(response).await?;

		let account = AccountInfo {
			account_id: auth.account_id,
			capabilities: known_capabilities(auth.allowed.capabilities),
			api_url: auth.api_url.trim_end_matches('/').to_string(),
		};

		debug!(
			account_id = %account.account_id,
			capability_count = account.capabilities.len(),
			"Account authorized"
		);

		Ok(Arc::new(B2Client {
			http_client: self.http_client.clone(),
			account,
			auth_token: SecretString::new(auth.authorization_token),
		}))
	}
}

/// Authorized B2 client bound to one root credential.
#[derive(Debug, Clone)]
pub struct B2Client {
	http_client: Client,
	account: AccountInfo,
	auth_token: SecretString,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListBucketsRequest<'a> {
	account_id: &'a str,
	bucket_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
	buckets: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketEntry {
	bucket_id: String,
	bucket_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyRequest<'a> {
	account_id: &'a str,
	capabilities: Vec<&'static str>,
	key_name: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	valid_duration_in_seconds: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	bucket_id: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	name_prefix: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
	application_key_id: String,
	#[serde(default)]
	application_key: Option<String>,
	key_name: String,
	#[serde(default)]
	capabilities: Vec<String>,
	#[serde(default)]
	bucket_id: Option<String>,
	#[serde(default)]
	name_prefix: Option<String>,
	#[serde(default)]
	expiration_timestamp: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteKeyRequest<'a> {
	application_key_id: &'a str,
}

impl B2Client {
	async fn post<B, R>(&self, operation: &str, body: &B) -> Result<R>
	where
		B: Serialize + ?Sized,
		R: DeserializeOwned,
	{
		let url = format!("{}/{API_PREFIX}/{operation}", self.account.api_url);
		debug!(url = %url, "Sending control plane request");

		let response = self
			.http_client
			.post(&url)
			.header("Authorization", self.auth_token.expose().as_str())
			.json(body)
			.send()
			.await?;

		decode_response(response).await
	}

	#[instrument(skip(self), fields(account_id = %self.account.account_id))]
	async fn resolve_bucket_id(&self, bucket_name: &str) -> Result<String> {
		let response: ListBucketsResponse = self
			.post(
				"b2_list_buckets",
				&ListBucketsRequest {
					account_id: &self.account.account_id,
					bucket_name,
				},
			)
			.await?;

		response
			.buckets
			.into_iter()
			.find(|b| b.bucket_name == bucket_name)
			.map(|b| b.bucket_id)
			.ok_or_else(|| ControlPlaneError::BucketNotFound(bucket_name.to_string()))
	}
}

#[async_trait]
impl ControlPlane for B2Client {
	fn account(&self) -> &AccountInfo {
		&self.account
	}

	#[instrument(skip(self, request), fields(key_name = %request.key_name, bucket = ?request.bucket))]
	async fn create_key(&self, request: &KeyRequest) -> Result<CreatedKey> {
		let bucket_id = match &request.bucket {
			Some(name) => Some(self.resolve_bucket_id(name).await?),
			None => None,
		};

		let body = CreateKeyRequest {
			account_id: &self.account.account_id,
			capabilities: request.capabilities.iter().map(Capability::as_str).collect(),
			key_name: &request.key_name,
			valid_duration_in_seconds: request.valid_duration.map(|d| d.as_secs()),
			bucket_id: bucket_id.as_deref(),
			name_prefix: bucket_id
				.as_ref()
				.and(request.name_prefix.as_deref()),
		};

		let key: KeyResponse = self.post("b2_create_key", &body).await?;
		let application_key = key.application_key.ok_or_else(|| {
			ControlPlaneError::InvalidResponse("b2_create_key response has no applicationKey".to_string())
		})?;

		debug!(key_id = %key.application_key_id, "Application key created");

		Ok(CreatedKey {
			key_id: key.application_key_id,
			application_key: SecretString::new(application_key),
			key_name: key.key_name,
			capabilities: known_capabilities(key.capabilities),
			bucket_id: key.bucket_id,
			name_prefix: key.name_prefix,
			expires_at: key.expiration_timestamp.and_then(millis_to_datetime),
		})
	}

	#[instrument(skip(self))]
	async fn delete_key(&self, key_id: &str) -> Result<()> {
		let _: KeyResponse = self
			.post(
				"b2_delete_key",
				&DeleteKeyRequest {
					application_key_id: key_id,
				},
			)
			.await?;

		debug!(key_id = %key_id, "Application key deleted");
		Ok(())
	}
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
	#[serde(default)]
	code: String,
	#[serde(default)]
	message: String,
}

async fn decode_response<R: DeserializeOwned>(response: Response) -> Result<R> {
	let status = response.status();
	let body = response.text().await?;

	if !status.is_success() {
		return Err(classify_error(status.as_u16(), &body));
	}

	trace!(status = status.as_u16(), "Control plane response received");

	serde_json::from_str(&body).map_err(|e| {
		error!(error = %e, "Failed to parse control plane response");
		ControlPlaneError::InvalidResponse(format!("JSON parse error: {e}"))
	})
}

/// Map an error status and body onto [`ControlPlaneError`].
///
/// The raw body is never echoed; only the `code` and `message` fields are kept.
fn classify_error(status: u16, body: &str) -> ControlPlaneError {
	let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
	let message = if parsed.message.is_empty() {
		format!("HTTP {status}")
	} else {
		parsed.message
	};
	let lowered = message.to_lowercase();

	let err = match (status, parsed.code.as_str()) {
		(404, _) | (_, "not_found") => ControlPlaneError::NotFound(message),
		(400, "bad_request")
			if lowered.contains("not found") || lowered.contains("does not exist") =>
		{
			ControlPlaneError::NotFound(message)
		}
		(401, _) | (403, _) => ControlPlaneError::Unauthorized(message),
		_ => ControlPlaneError::Api {
			status,
			code: parsed.code,
			message,
		},
	};

	if err.is_not_found() {
		debug!(status, "Control plane reported resource not found");
	} else {
		error!(status, error = %err, "Control plane request failed");
	}
	err
}

fn known_capabilities(names: Vec<String>) -> CapabilitySet {
	names
		.into_iter()
		.filter_map(|name| match name.parse::<Capability>() {
			Ok(cap) => Some(cap),
			Err(_) => {
				trace!(capability = %name, "Ignoring capability unknown to this client");
				None
			}
		})
		.collect()
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
	Utc.timestamp_millis_opt(millis).single()
}
