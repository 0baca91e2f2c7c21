// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use b2keys_config::{load_config, load_config_with_file, B2keysConfig};
use b2keys_control_plane::B2Connector;
use b2keys_engine::{Backend, BackendOptions};
use clap::{Parser, Subcommand};
use commands::CommandError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// b2keys - short-lived Backblaze B2 application keys
#[derive(Parser, Debug)]
#[command(name = "b2keys", version, about, long_about = None)]
struct Args {
	/// Path to custom configuration file
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Read or write the root credential
	Config {
		#[command(subcommand)]
		command: ConfigCommand,
	},
	/// Rotate the root credential
	Rotate {
		/// Rotate to this existing key instead of minting one
		#[arg(long)]
		key_id: Option<String>,
		/// Secret for --key-id (falls back to B2KEYS_APPLICATION_KEY[_FILE])
		#[arg(long)]
		application_key: Option<String>,
	},
	/// Manage roles
	Roles {
		#[command(subcommand)]
		command: RolesCommand,
	},
	/// Issue a key for a role
	Issue {
		role: String,
		/// Requested lifetime in seconds, clamped to the role's max_ttl
		#[arg(long)]
		ttl: Option<u64>,
	},
	/// Revoke an issued key
	Revoke { key_id: String },
	/// Show version information
	Version,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
	/// Show the stored root credential (without its secret)
	Read,
	/// Verify and store a root credential
	Write {
		#[arg(long)]
		key_id: String,
		/// Secret for --key-id (falls back to B2KEYS_APPLICATION_KEY[_FILE])
		#[arg(long)]
		application_key: Option<String>,
	},
}

#[derive(Subcommand, Debug)]
enum RolesCommand {
	/// List role names
	List,
	/// Show one role
	Read { name: String },
	/// Create or replace a role
	Write {
		name: String,
		/// Comma separated capabilities, e.g. readFiles,listFiles
		#[arg(long)]
		capabilities: String,
		#[arg(long)]
		bucket: Option<String>,
		/// Requires --bucket
		#[arg(long)]
		name_prefix: Option<String>,
		/// Seconds
		#[arg(long)]
		default_ttl: Option<u64>,
		/// Seconds
		#[arg(long)]
		max_ttl: Option<u64>,
	},
	/// Delete a role
	Delete { name: String },
}

fn init_tracing(config: &B2keysConfig, override_level: Option<&str>) {
	let level = override_level.unwrap_or(&config.logging.level);
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr))
		.init();
}

async fn open_backend(config: &B2keysConfig) -> Result<Backend, CommandError> {
	let storage = b2keys_storage::open_storage(&config.storage.url)
		.await
		.map_err(|e| CommandError::Engine(e.into()))?;
	let connector = B2Connector::new(
		config.control_plane.api_url.clone(),
		config.control_plane.request_timeout(),
	)
	.context("failed to build control plane client")
	.map_err(CommandError::Usage)?;

	let backend = Backend::open(
		storage,
		Arc::new(connector),
		BackendOptions {
			key_name_prefix: config.control_plane.key_name_prefix.clone(),
			..BackendOptions::default()
		},
	)
	.await?;
	tracing::info!(
		storage = %config.storage.url,
		api_url = %config.control_plane.api_url,
		"backend ready"
	);
	Ok(backend)
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", serde_json::to_string_pretty(&commands::version_info())?);
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => load_config_with_file(path),
		None => load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config, args.log_level.as_deref());

	let result = match open_backend(&config).await {
		Ok(backend) => commands::execute(&backend, args.command).await,
		Err(e) => Err(e),
	};
	match result {
		Ok(output) => {
			println!("{}", serde_json::to_string_pretty(&output)?);
			Ok(())
		}
		Err(CommandError::Engine(e)) => {
			let body = commands::error_body(&e);
			eprintln!("{}", serde_json::to_string_pretty(&body)?);
			std::process::exit(if e.kind().is_client_error() { 2 } else { 1 });
		}
		Err(CommandError::Usage(e)) => Err(e),
	}
}
