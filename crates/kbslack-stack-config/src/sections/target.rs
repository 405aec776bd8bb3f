// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deploy target: the account and region every regional ARN is rendered for.

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Deploy target (runtime, resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
	pub account: String,
	pub region: String,
}

impl TargetConfig {
	/// The `aws://<account>/<region>` environment string.
	pub fn environment_uri(&self) -> String {
		format!("aws://{}/{}", self.account, self.region)
	}
}

/// Deploy target layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfigLayer {
	#[serde(default)]
	pub account: Option<String>,
	#[serde(default)]
	pub region: Option<String>,
}

impl TargetConfigLayer {
	pub fn merge(&mut self, other: TargetConfigLayer) {
		if other.account.is_some() {
			self.account = other.account;
		}
		if other.region.is_some() {
			self.region = other.region;
		}
	}

	pub fn resolve(self) -> Result<TargetConfig, ConfigError> {
		let account = self
			.account
			.ok_or(ConfigError::UnresolvedEnvironment { field: "account" })?;
		if !is_valid_account(&account) {
			return Err(ConfigError::invalid_value(
				"target.account",
				format!("'{account}' is not a 12 digit account id"),
			));
		}

		let region = self.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
		if !is_valid_region(&region) {
			return Err(ConfigError::invalid_value(
				"target.region",
				format!("'{region}' is not a region name"),
			));
		}

		Ok(TargetConfig { account, region })
	}
}

pub fn is_valid_account(account: &str) -> bool {
	account.len() == 12 && account.bytes().all(|b| b.is_ascii_digit())
}

/// Accepts names shaped like `us-east-1` or `us-gov-west-1`.
pub fn is_valid_region(region: &str) -> bool {
	let parts: Vec<&str> = region.split('-').collect();
	if parts.len() < 3 || parts.len() > 4 {
		return false;
	}
	let Some((last, words)) = parts.split_last() else {
		return false;
	};
	let lowercase = |s: &&str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_lowercase());
	words.iter().all(lowercase)
		&& words[0].len() == 2
		&& !last.is_empty()
		&& last.bytes().all(|b| b.is_ascii_digit())
}
