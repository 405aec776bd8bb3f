// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment marker. Controls termination protection and the stage tag.

use serde::Deserialize;

pub const DEFAULT_ENVIRONMENT: &str = "DEV";

/// Only this exact value counts as production.
pub const PRODUCTION_ENVIRONMENT: &str = "prod";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
	pub name: String,
}

impl Default for EnvironmentConfig {
	fn default() -> Self {
		Self {
			name: DEFAULT_ENVIRONMENT.to_string(),
		}
	}
}

impl EnvironmentConfig {
	pub fn is_production(&self) -> bool {
		self.name == PRODUCTION_ENVIRONMENT
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfigLayer {
	#[serde(default)]
	pub name: Option<String>,
}

impl EnvironmentConfigLayer {
	pub fn merge(&mut self, other: EnvironmentConfigLayer) {
		if other.name.is_some() {
			self.name = other.name;
		}
	}

	pub fn finalize(self) -> EnvironmentConfig {
		EnvironmentConfig {
			name: self
				.name
				.filter(|n| !n.is_empty())
				.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
		}
	}
}
