// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deploy configuration for the Slack knowledge-base stack.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file, the environment and
//!   deploy context (`-c key=value`)
//! - A single validated [`StackConfig`] passed explicitly to stack assembly
//! - Credential handling through [`SecretString`](kbslack_common_secret::SecretString)
//!
//! # Usage
//!
//! ```ignore
//! use kbslack_stack_config::load_config;
//!
//! let config = load_config()?;
//! println!("deploying to {}", config.target.environment_uri());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

use std::collections::BTreeMap;
use std::path::PathBuf;

pub use error::ConfigError;
pub use layer::StackConfigLayer;
pub use sections::*;
pub use sources::{
	parse_context_pairs, ConfigSource, ContextSource, DefaultsSource, EnvSource, Precedence,
	TomlSource,
};

use tracing::{debug, info};

/// Fully resolved and validated deploy configuration.
#[derive(Debug, Clone)]
pub struct StackConfig {
	pub identity: IdentityConfig,
	pub credentials: CredentialsConfig,
	pub target: TargetConfig,
	pub environment: EnvironmentConfig,
	pub tags: TagsConfig,
	pub function: FunctionConfig,
	pub edge: EdgeConfig,
	pub permissions: PermissionsConfig,
}

impl StackConfig {
	pub fn termination_protection(&self) -> bool {
		self.environment.is_production()
	}
}

/// Inputs for [`load_config_with`].
#[derive(Debug, Default)]
pub struct LoadOptions {
	/// Explicit config file; when `None`, `kbslack.toml` is used if present.
	pub config_file: Option<PathBuf>,
	pub context: BTreeMap<String, String>,
	pub env: EnvSource,
}

/// Load configuration with standard precedence from the process environment.
///
/// Precedence (highest to lowest):
/// 1. Deploy context (none here)
/// 2. Environment variables
/// 3. `kbslack.toml` in the working directory
/// 4. Built-in defaults
pub fn load_config() -> Result<StackConfig, ConfigError> {
	load_config_with(LoadOptions {
		env: EnvSource::process(),
		..Default::default()
	})
}

pub fn load_config_with(options: LoadOptions) -> Result<StackConfig, ConfigError> {
	let toml = match options.config_file {
		Some(path) => TomlSource::required(path),
		None => TomlSource::workspace(),
	};
	let deploy_region = options.env.var("CDK_DEFAULT_REGION");

	let mut sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(toml),
		Box::new(options.env),
		Box::new(ContextSource::new(options.context, deploy_region)),
	];

	sources.sort_by_key(|s| s.precedence());

	let mut merged = StackConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	resolve(merged)
}

/// Resolve a merged layer, validating every section.
///
/// Credentials are checked first so a missing one is reported before anything else.
pub fn resolve(layer: StackConfigLayer) -> Result<StackConfig, ConfigError> {
	let credentials = layer.credentials.unwrap_or_default().resolve()?;
	let target = layer.target.unwrap_or_default().resolve()?;
	let identity = layer.identity.unwrap_or_default().resolve()?;
	let environment = layer.environment.unwrap_or_default().finalize();
	let tags = layer.tags.unwrap_or_default().finalize();
	let function = layer.function.unwrap_or_default().resolve()?;
	let edge = layer.edge.unwrap_or_default().resolve()?;
	let permissions = layer.permissions.unwrap_or_default().resolve()?;

	info!(
		stack = %identity.stack_name,
		target = %target.environment_uri(),
		environment = %environment.name,
		termination_protection = environment.is_production(),
		rate_limit = edge.rate_limit,
		burst_limit = edge.burst_limit,
		self_invoke_scope = permissions.self_invoke_scope.as_str(),
		"Stack configuration loaded"
	);

	Ok(StackConfig {
		identity,
		credentials,
		target,
		environment,
		tags,
		function,
		edge,
		permissions,
	})
}
