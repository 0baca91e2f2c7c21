// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One engine operation per command, rendered as JSON.

use std::time::Duration;

use b2keys_common_secret::SecretString;
use b2keys_config::load_secret_env;
use b2keys_control_plane::parse_capabilities;
use b2keys_engine::{Backend, EngineError, Role};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{Command, ConfigCommand, RolesCommand};

pub const APPLICATION_KEY_ENV: &str = "B2KEYS_APPLICATION_KEY";

#[derive(Debug)]
pub enum CommandError {
	/// The engine refused or failed the operation.
	Engine(EngineError),
	/// The command line could not be turned into an operation.
	Usage(anyhow::Error),
}

impl From<EngineError> for CommandError {
	fn from(e: EngineError) -> Self {
		CommandError::Engine(e)
	}
}

pub fn error_body(e: &EngineError) -> Value {
	json!({
		"error": {
			"kind": e.kind().as_str(),
			"message": e.to_string(),
		}
	})
}

pub fn version_info() -> Value {
	json!({
		"name": "b2keys",
		"version": env!("CARGO_PKG_VERSION"),
		"platform": format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
	})
}

pub async fn execute(backend: &Backend, command: Command) -> Result<Value, CommandError> {
	match command {
		Command::Config { command } => match command {
			ConfigCommand::Read => to_json(&backend.read_config().await?),
			ConfigCommand::Write {
				key_id,
				application_key,
			} => {
				let secret = resolve_secret(application_key)?;
				to_json(&backend.write_config(&key_id, secret).await?)
			}
		},
		Command::Rotate {
			key_id,
			application_key,
		} => {
			let outcome = match key_id {
				Some(key_id) => {
					let secret = resolve_secret(application_key)?;
					backend.rotate_to(&key_id, secret).await?
				}
				None => backend.rotate().await?,
			};
			to_json(&outcome)
		}
		Command::Roles { command } => roles(backend, command).await,
		Command::Issue { role, ttl } => {
			let issued = backend
				.issue_key(&role, ttl.map(Duration::from_secs))
				.await?;
			Ok(json!({
				"data": to_json(&issued.secret_data())?,
				"lease": to_json(&issued.lease())?,
				"expires_at": issued.expires_at,
			}))
		}
		Command::Revoke { key_id } => {
			let result = backend.revoke_key(&key_id).await?;
			Ok(json!({ "key_id": key_id, "result": to_json(&result)? }))
		}
		Command::Version => Ok(version_info()),
	}
}

async fn roles(backend: &Backend, command: RolesCommand) -> Result<Value, CommandError> {
	match command {
		RolesCommand::List => Ok(json!({ "keys": backend.list_roles().await? })),
		RolesCommand::Read { name } => {
			let role = backend.get_role(&name).await?;
			Ok(json!({ "name": name, "role": to_json(&role)? }))
		}
		RolesCommand::Write {
			name,
			capabilities,
			bucket,
			name_prefix,
			default_ttl,
			max_ttl,
		} => {
			let capabilities =
				parse_capabilities(&capabilities).map_err(|e| EngineError::InvalidRole {
					role: name.clone(),
					reason: e.to_string(),
				})?;
			let role = Role {
				capabilities,
				bucket,
				name_prefix,
				default_ttl: default_ttl.map(Duration::from_secs),
				max_ttl: max_ttl.map(Duration::from_secs),
			};

			let existed = backend.role_exists(&name).await?;
			let stored = backend.put_role(&name, role).await?;
			Ok(json!({
				"name": name,
				"created": !existed,
				"role": to_json(&stored)?,
			}))
		}
		RolesCommand::Delete { name } => {
			backend.delete_role(&name).await?;
			Ok(json!({ "deleted": name }))
		}
	}
}

/// An explicit secret, or one from `B2KEYS_APPLICATION_KEY[_FILE]`.
fn resolve_secret(explicit: Option<String>) -> Result<SecretString, CommandError> {
	if let Some(secret) = explicit {
		return Ok(SecretString::new(secret));
	}

	load_secret_env(APPLICATION_KEY_ENV)
		.map_err(|e| CommandError::Usage(e.into()))?
		.ok_or_else(|| {
			CommandError::Usage(anyhow::anyhow!(
				"--application-key or {APPLICATION_KEY_ENV} is required"
			))
		})
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CommandError> {
	serde_json::to_value(value).map_err(|e| CommandError::Usage(e.into()))
}
