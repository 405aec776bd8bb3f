// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compute unit settings. The handler code itself lives outside this
//! workspace and is referenced by path.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
	#[default]
	Arm64,
	X86_64,
}

impl Architecture {
	pub fn as_str(&self) -> &'static str {
		match self {
			Architecture::Arm64 => "arm64",
			Architecture::X86_64 => "x86_64",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s.to_lowercase().as_str() {
			"arm64" => Some(Architecture::Arm64),
			"x86_64" | "x86-64" => Some(Architecture::X86_64),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
	pub runtime: String,
	pub handler: String,
	pub memory_mb: u32,
	/// Per-invocation ceiling; the platform terminates invocations past it.
	pub timeout_secs: u32,
	pub architecture: Architecture,
	/// Directory holding the handler code.
	pub code_path: PathBuf,
	pub knowledge_base_id: Option<String>,
	pub model_arn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionConfigLayer {
	#[serde(default)]
	pub runtime: Option<String>,
	#[serde(default)]
	pub handler: Option<String>,
	#[serde(default)]
	pub memory_mb: Option<u32>,
	#[serde(default)]
	pub timeout_secs: Option<u32>,
	#[serde(default)]
	pub architecture: Option<Architecture>,
	#[serde(default)]
	pub code_path: Option<PathBuf>,
	#[serde(default)]
	pub knowledge_base_id: Option<String>,
	#[serde(default)]
	pub model_arn: Option<String>,
}

impl FunctionConfigLayer {
	pub fn merge(&mut self, other: FunctionConfigLayer) {
		if other.runtime.is_some() {
			self.runtime = other.runtime;
		}
		if other.handler.is_some() {
			self.handler = other.handler;
		}
		if other.memory_mb.is_some() {
			self.memory_mb = other.memory_mb;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.architecture.is_some() {
			self.architecture = other.architecture;
		}
		if other.code_path.is_some() {
			self.code_path = other.code_path;
		}
		if other.knowledge_base_id.is_some() {
			self.knowledge_base_id = other.knowledge_base_id;
		}
		if other.model_arn.is_some() {
			self.model_arn = other.model_arn;
		}
	}

	pub fn resolve(self) -> Result<FunctionConfig, ConfigError> {
		let memory_mb = self.memory_mb.unwrap_or(256);
		if !(128..=10_240).contains(&memory_mb) {
			return Err(ConfigError::invalid_value(
				"function.memory_mb",
				format!("{memory_mb} is outside 128..=10240"),
			));
		}

		let timeout_secs = self.timeout_secs.unwrap_or(30);
		if !(1..=900).contains(&timeout_secs) {
			return Err(ConfigError::invalid_value(
				"function.timeout_secs",
				format!("{timeout_secs} is outside 1..=900"),
			));
		}

		if let Some(arn) = &self.model_arn {
			if !arn.starts_with("arn:aws:bedrock:") {
				return Err(ConfigError::invalid_value(
					"function.model_arn",
					format!("'{arn}' is not a bedrock ARN"),
				));
			}
		}

		Ok(FunctionConfig {
			runtime: self.runtime.unwrap_or_else(|| "python3.12".to_string()),
			handler: self.handler.unwrap_or_else(|| "index.handler".to_string()),
			memory_mb,
			timeout_secs,
			architecture: self.architecture.unwrap_or_default(),
			code_path: self.code_path.unwrap_or_else(|| PathBuf::from("lambda")),
			knowledge_base_id: self.knowledge_base_id.filter(|s| !s.is_empty()),
			model_arn: self.model_arn,
		})
	}
}
