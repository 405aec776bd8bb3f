// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

use crate::permissions::PolicyViolation;

/// Result type alias for stack synthesis.
pub type StackResult<T> = Result<T, StackError>;

/// Errors that abort synthesis. None of them leave a partial template behind.
#[derive(Error, Debug)]
pub enum StackError {
	#[error("missing required credential '{name}'. Please provide slackBotToken and slackSigningSecret")]
	MissingCredential { name: &'static str },

	#[error("deploy target {field} is unresolved or invalid: '{value}'")]
	UnresolvedEnvironment { field: &'static str, value: String },

	#[error("asset directory {path} is unreadable: {source}")]
	Asset {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("asset path {path} is not a directory")]
	AssetNotDirectory { path: PathBuf },

	#[error("logical id {0} is already defined")]
	DuplicateLogicalId(String),

	#[error("{from} references {to}, which has not been defined yet")]
	DanglingReference { from: String, to: String },

	#[error("permission boundary audit failed: {0}")]
	PolicyAudit(#[from] PolicyViolation),

	#[error("failed to serialize {what}: {source}")]
	Serialize {
		what: &'static str,
		#[source]
		source: serde_json::Error,
	},

	#[error("failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}
