// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while loading or validating the deploy configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error(
		"missing required credential '{name}'. Please provide slackBotToken and slackSigningSecret"
	)]
	MissingCredential { name: &'static str },

	#[error("deploy target {field} is not resolved; set it in the deploy context")]
	UnresolvedEnvironment { field: &'static str },

	#[error("region must be specified via the deploy context (CDK_DEFAULT_REGION)")]
	RegionWithoutDeployContext,

	#[error("secret error: {0}")]
	Secret(String),

	#[error("validation error: {0}")]
	Validation(String),
}

impl ConfigError {
	pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			key: key.into(),
			message: message.into(),
		}
	}
}
