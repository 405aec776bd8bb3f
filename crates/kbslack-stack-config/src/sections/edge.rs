// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Edge endpoint settings: route path, stage and admission limits.

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeConfig {
	pub api_name: String,
	/// Steady-state requests per second.
	pub rate_limit: f64,
	/// Requests admitted at once from an idle bucket.
	pub burst_limit: u32,
	pub stage_name: String,
	/// Single path segment the webhook is served on.
	pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeConfigLayer {
	#[serde(default)]
	pub api_name: Option<String>,
	#[serde(default)]
	pub rate_limit: Option<f64>,
	#[serde(default)]
	pub burst_limit: Option<u32>,
	#[serde(default)]
	pub stage_name: Option<String>,
	#[serde(default)]
	pub path: Option<String>,
}

impl EdgeConfigLayer {
	pub fn merge(&mut self, other: EdgeConfigLayer) {
		if other.api_name.is_some() {
			self.api_name = other.api_name;
		}
		if other.rate_limit.is_some() {
			self.rate_limit = other.rate_limit;
		}
		if other.burst_limit.is_some() {
			self.burst_limit = other.burst_limit;
		}
		if other.stage_name.is_some() {
			self.stage_name = other.stage_name;
		}
		if other.path.is_some() {
			self.path = other.path;
		}
	}

	pub fn resolve(self) -> Result<EdgeConfig, ConfigError> {
		let rate_limit = self.rate_limit.unwrap_or(10.0);
		if !rate_limit.is_finite() || rate_limit <= 0.0 {
			return Err(ConfigError::invalid_value(
				"edge.rate_limit",
				format!("{rate_limit} must be a positive number"),
			));
		}

		let burst_limit = self.burst_limit.unwrap_or(20);
		if burst_limit == 0 {
			return Err(ConfigError::invalid_value(
				"edge.burst_limit",
				"must be at least 1",
			));
		}

		let path = self.path.unwrap_or_else(|| "slack".to_string());
		if path.is_empty()
			|| !path
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		{
			return Err(ConfigError::invalid_value(
				"edge.path",
				format!("'{path}' must be a single path segment"),
			));
		}

		let stage_name = self.stage_name.unwrap_or_else(|| "prod".to_string());
		if stage_name.is_empty()
			|| !stage_name
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '_')
		{
			return Err(ConfigError::invalid_value(
				"edge.stage_name",
				format!("'{stage_name}' may only contain letters, digits and underscores"),
			));
		}

		Ok(EdgeConfig {
			api_name: self
				.api_name
				.unwrap_or_else(|| "SlackBedrockAPI".to_string()),
			rate_limit,
			burst_limit,
			stage_name,
			path,
		})
	}
}
