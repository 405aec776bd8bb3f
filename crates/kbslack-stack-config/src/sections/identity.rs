// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack name and description.

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_STACK_NAME: &str = "AmazonBedrockKnowledgebaseSlackIntegrationStack";
pub const DEFAULT_DESCRIPTION: &str = "Stack for Bedrock Knowledge Base integration with Slack";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
	pub stack_name: String,
	pub description: String,
}

impl Default for IdentityConfig {
	fn default() -> Self {
		Self {
			stack_name: DEFAULT_STACK_NAME.to_string(),
			description: DEFAULT_DESCRIPTION.to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfigLayer {
	#[serde(default)]
	pub stack_name: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
}

impl IdentityConfigLayer {
	pub fn merge(&mut self, other: IdentityConfigLayer) {
		if other.stack_name.is_some() {
			self.stack_name = other.stack_name;
		}
		if other.description.is_some() {
			self.description = other.description;
		}
	}

	pub fn resolve(self) -> Result<IdentityConfig, ConfigError> {
		let stack_name = self
			.stack_name
			.unwrap_or_else(|| DEFAULT_STACK_NAME.to_string());
		// Stack names: letters, digits and hyphens, starting with a letter, at most 128 chars.
		let valid = stack_name.len() <= 128
			&& stack_name
				.chars()
				.next()
				.is_some_and(|c| c.is_ascii_alphabetic())
			&& stack_name
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-');
		if !valid {
			return Err(ConfigError::invalid_value(
				"stack.stack_name",
				format!("'{stack_name}' is not a valid stack name"),
			));
		}

		Ok(IdentityConfig {
			stack_name,
			description: self
				.description
				.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
		})
	}
}
