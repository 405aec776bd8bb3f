// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML file, environment, deploy context.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use kbslack_common_secret::SecretString;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::StackConfigLayer;
use crate::sections::{
	Architecture, CredentialsConfigLayer, EdgeConfigLayer, EnvironmentConfigLayer,
	FunctionConfigLayer, IdentityConfigLayer, PermissionsConfigLayer, SelfInvokeScope,
	TagsConfigLayer, TargetConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	Context = 60,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<StackConfigLayer, ConfigError>;
}

/// Built-in defaults live in each section's `resolve`, so this is empty.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<StackConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(StackConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
	required: bool,
}

impl TomlSource {
	/// A file that is skipped when absent.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: false,
		}
	}

	/// A file the operator named explicitly; absence is an error.
	pub fn required(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
		}
	}

	/// `kbslack.toml` in the working directory.
	pub fn workspace() -> Self {
		Self::new("kbslack.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<StackConfigLayer, ConfigError> {
		if !self.required && !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(StackConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: StackConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Reads the process environment unless constructed from explicit pairs.
/// Empty values are treated as unset.
#[derive(Clone, Default)]
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl std::fmt::Debug for EnvSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let keys: Option<Vec<&String>> = self.vars.as_ref().map(|v| v.keys().collect());
		f.debug_struct("EnvSource").field("keys", &keys).finish()
	}
}

impl EnvSource {
	pub fn process() -> Self {
		Self { vars: None }
	}

	pub fn from_pairs<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				pairs
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	pub fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	/// Read a secret from `NAME` or from the file named by `NAME_FILE`.
	pub fn secret(&self, name: &str) -> Result<Option<SecretString>, ConfigError> {
		let file_var = format!("{name}_FILE");
		match (self.var(name), self.var(&file_var)) {
			(Some(_), Some(_)) => Err(ConfigError::Secret(format!(
				"both {name} and {file_var} are set"
			))),
			(Some(value), None) => Ok(Some(SecretString::new(value))),
			(None, Some(path)) => read_secret_file(Path::new(&path)).map(Some),
			(None, None) => Ok(None),
		}
	}

	fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.trim().parse().map(Some).map_err(|_| {
				ConfigError::invalid_value(name, format!("cannot parse '{v}'"))
			}),
			None => Ok(None),
		}
	}
}

fn read_secret_file(path: &Path) -> Result<SecretString, ConfigError> {
	let content = std::fs::read_to_string(path).map_err(|e| {
		ConfigError::Secret(format!("failed to read {}: {e}", path.display()))
	})?;
	Ok(SecretString::new(
		content.trim_end_matches(['\r', '\n']).to_string(),
	))
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<StackConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(StackConfigLayer {
			identity: Some(IdentityConfigLayer {
				stack_name: self.var("KBSLACK_STACK_NAME"),
				description: self.var("KBSLACK_STACK_DESCRIPTION"),
			}),
			credentials: Some(CredentialsConfigLayer {
				slack_bot_token: self.secret("SLACK_BOT_TOKEN")?,
				slack_signing_secret: self.secret("SLACK_SIGNING_SECRET")?,
			}),
			target: Some(TargetConfigLayer {
				account: self.var("CDK_DEFAULT_ACCOUNT"),
				region: self.var("CDK_DEFAULT_REGION"),
			}),
			environment: Some(EnvironmentConfigLayer {
				name: self.var("ENVIRONMENT"),
			}),
			tags: Some(TagsConfigLayer {
				division: self.var("KBSLACK_TAG_DIVISION"),
				service: self.var("KBSLACK_TAG_SERVICE"),
				owner: self.var("KBSLACK_TAG_OWNER"),
			}),
			function: Some(self.load_function()?),
			edge: Some(EdgeConfigLayer {
				api_name: self.var("KBSLACK_EDGE_API_NAME"),
				rate_limit: self.parsed("KBSLACK_EDGE_RATE_LIMIT")?,
				burst_limit: self.parsed("KBSLACK_EDGE_BURST_LIMIT")?,
				stage_name: self.var("KBSLACK_EDGE_STAGE_NAME"),
				path: self.var("KBSLACK_EDGE_PATH"),
			}),
			permissions: Some(self.load_permissions()?),
		})
	}
}

impl EnvSource {
	fn load_function(&self) -> Result<FunctionConfigLayer, ConfigError> {
		let architecture = match self.var("KBSLACK_FUNCTION_ARCHITECTURE") {
			Some(v) => Some(Architecture::parse(&v).ok_or_else(|| {
				ConfigError::invalid_value(
					"KBSLACK_FUNCTION_ARCHITECTURE",
					format!("unknown architecture '{v}'"),
				)
			})?),
			None => None,
		};

		Ok(FunctionConfigLayer {
			runtime: self.var("KBSLACK_FUNCTION_RUNTIME"),
			handler: self.var("KBSLACK_FUNCTION_HANDLER"),
			memory_mb: self.parsed("KBSLACK_FUNCTION_MEMORY_MB")?,
			timeout_secs: self.parsed("KBSLACK_FUNCTION_TIMEOUT_SECS")?,
			architecture,
			code_path: self.var("KBSLACK_FUNCTION_CODE_PATH").map(PathBuf::from),
			knowledge_base_id: self.var("KBSLACK_KNOWLEDGE_BASE_ID"),
			model_arn: self.var("KBSLACK_MODEL_ARN"),
		})
	}

	fn load_permissions(&self) -> Result<PermissionsConfigLayer, ConfigError> {
		let model_regions = self.var("KBSLACK_MODEL_REGIONS").map(|s| {
			s.split(',')
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect()
		});

		let self_invoke_scope = match self.var("KBSLACK_SELF_INVOKE_SCOPE") {
			Some(v) => Some(SelfInvokeScope::parse(&v).ok_or_else(|| {
				ConfigError::invalid_value(
					"KBSLACK_SELF_INVOKE_SCOPE",
					format!("expected any-function or own-function, got '{v}'"),
				)
			})?),
			None => None,
		};

		Ok(PermissionsConfigLayer {
			model_regions,
			self_invoke_scope,
		})
	}
}

/// Deploy context values passed as `-c key=value`.
///
/// Recognised keys: `slackBotToken`, `slackSigningSecret`, `region`.
pub struct ContextSource {
	values: BTreeMap<String, String>,
	deploy_region: Option<String>,
}

impl ContextSource {
	/// `deploy_region` is the region resolved from the deploy environment
	/// (`CDK_DEFAULT_REGION`). A context `region` is validated against it but
	/// never replaces it; the deploy environment alone picks the target.
	pub fn new(values: BTreeMap<String, String>, deploy_region: Option<String>) -> Self {
		Self {
			values,
			deploy_region,
		}
	}

	fn get(&self, key: &str) -> Option<&String> {
		self.values.get(key).filter(|v| !v.is_empty())
	}
}

impl ConfigSource for ContextSource {
	fn name(&self) -> &'static str {
		"context"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Context
	}

	fn load(&self) -> Result<StackConfigLayer, ConfigError> {
		debug!(keys = self.values.len(), "loading deploy context");
		for key in self.values.keys() {
			if !matches!(key.as_str(), "slackBotToken" | "slackSigningSecret" | "region") {
				debug!(key = %key, "ignoring unrecognised context key");
			}
		}

		if self.get("region").is_some() && self.deploy_region.is_none() {
			return Err(ConfigError::RegionWithoutDeployContext);
		}

		Ok(StackConfigLayer {
			credentials: Some(CredentialsConfigLayer {
				slack_bot_token: self.get("slackBotToken").cloned().map(SecretString::new),
				slack_signing_secret: self
					.get("slackSigningSecret")
					.cloned()
					.map(SecretString::new),
			}),
			..Default::default()
		})
	}
}

/// Parse `key=value` pairs as given on the command line.
pub fn parse_context_pairs<I, S>(pairs: I) -> Result<BTreeMap<String, String>, ConfigError>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	pairs
		.into_iter()
		.map(|pair| {
			let pair = pair.as_ref();
			match pair.split_once('=') {
				Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
				_ => Err(ConfigError::invalid_value(
					"context",
					"expected key=value (value not shown)",
				)),
			}
		})
		.collect()
}
