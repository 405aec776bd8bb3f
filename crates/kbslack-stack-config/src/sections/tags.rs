// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cost/ownership attribution tags.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagsConfig {
	pub division: String,
	pub service: String,
	pub owner: String,
}

impl Default for TagsConfig {
	fn default() -> Self {
		TagsConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsConfigLayer {
	#[serde(default)]
	pub division: Option<String>,
	#[serde(default)]
	pub service: Option<String>,
	#[serde(default)]
	pub owner: Option<String>,
}

impl TagsConfigLayer {
	pub fn merge(&mut self, other: TagsConfigLayer) {
		if other.division.is_some() {
			self.division = other.division;
		}
		if other.service.is_some() {
			self.service = other.service;
		}
		if other.owner.is_some() {
			self.owner = other.owner;
		}
	}

	pub fn finalize(self) -> TagsConfig {
		TagsConfig {
			division: self.division.unwrap_or_else(|| "GROUP".to_string()),
			service: self
				.service
				.unwrap_or_else(|| "bedrock-slack-integration".to_string()),
			owner: self
				.owner
				.unwrap_or_else(|| "devops@travelopia.com".to_string()),
		}
	}
}
