// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission boundary settings.

use serde::Deserialize;

use super::target::is_valid_region;
use crate::error::ConfigError;

/// Regions foundation models may be invoked in, independent of the deploy region.
pub const DEFAULT_MODEL_REGIONS: [&str; 3] = ["us-east-1", "us-east-2", "us-west-2"];

/// Resource scope of the self-invoke grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelfInvokeScope {
	/// `lambda:InvokeFunction`/`GetFunction` on `*`. The listener pattern the
	/// handler uses was provisioned this way; kept as an explicit exception.
	#[default]
	AnyFunction,
	/// Narrowed to the function's own ARN.
	OwnFunction,
}

impl SelfInvokeScope {
	pub fn parse(s: &str) -> Option<Self> {
		match s.to_lowercase().as_str() {
			"any-function" | "any" => Some(SelfInvokeScope::AnyFunction),
			"own-function" | "own" => Some(SelfInvokeScope::OwnFunction),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			SelfInvokeScope::AnyFunction => "any-function",
			SelfInvokeScope::OwnFunction => "own-function",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionsConfig {
	pub model_regions: Vec<String>,
	pub self_invoke_scope: SelfInvokeScope,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionsConfigLayer {
	#[serde(default)]
	pub model_regions: Option<Vec<String>>,
	#[serde(default)]
	pub self_invoke_scope: Option<SelfInvokeScope>,
}

impl PermissionsConfigLayer {
	pub fn merge(&mut self, other: PermissionsConfigLayer) {
		if other.model_regions.is_some() {
			self.model_regions = other.model_regions;
		}
		if other.self_invoke_scope.is_some() {
			self.self_invoke_scope = other.self_invoke_scope;
		}
	}

	pub fn resolve(self) -> Result<PermissionsConfig, ConfigError> {
		let mut model_regions = self
			.model_regions
			.unwrap_or_else(|| DEFAULT_MODEL_REGIONS.iter().map(|r| r.to_string()).collect());
		if model_regions.is_empty() {
			return Err(ConfigError::invalid_value(
				"permissions.model_regions",
				"at least one region is required",
			));
		}
		if let Some(bad) = model_regions.iter().find(|r| !is_valid_region(r)) {
			return Err(ConfigError::invalid_value(
				"permissions.model_regions",
				format!("'{bad}' is not a region name"),
			));
		}
		let mut seen = std::collections::HashSet::new();
		model_regions.retain(|r| seen.insert(r.clone()));

		Ok(PermissionsConfig {
			model_regions,
			self_invoke_scope: self.self_invoke_scope.unwrap_or_default(),
		})
	}
}
