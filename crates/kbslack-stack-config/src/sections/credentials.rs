// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Slack credentials supplied at deploy time.

use kbslack_common_secret::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Credentials (runtime, resolved). Both values are guaranteed non-blank.
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
	pub slack_bot_token: SecretString,
	pub slack_signing_secret: SecretString,
}

/// Credentials layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfigLayer {
	#[serde(default)]
	pub slack_bot_token: Option<SecretString>,
	#[serde(default)]
	pub slack_signing_secret: Option<SecretString>,
}

impl CredentialsConfigLayer {
	pub fn merge(&mut self, other: CredentialsConfigLayer) {
		if other.slack_bot_token.is_some() {
			self.slack_bot_token = other.slack_bot_token;
		}
		if other.slack_signing_secret.is_some() {
			self.slack_signing_secret = other.slack_signing_secret;
		}
	}

	/// Both credentials are required; a blank value counts as absent.
	pub fn resolve(self) -> Result<CredentialsConfig, ConfigError> {
		let slack_bot_token = self
			.slack_bot_token
			.filter(|s| !s.is_blank())
			.ok_or(ConfigError::MissingCredential {
				name: "slackBotToken",
			})?;
		let slack_signing_secret = self
			.slack_signing_secret
			.filter(|s| !s.is_blank())
			.ok_or(ConfigError::MissingCredential {
				name: "slackSigningSecret",
			})?;

		Ok(CredentialsConfig {
			slack_bot_token,
			slack_signing_secret,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn layer(token: Option<&str>, secret: Option<&str>) -> CredentialsConfigLayer {
		CredentialsConfigLayer {
			slack_bot_token: token.map(SecretString::from),
			slack_signing_secret: secret.map(SecretString::from),
		}
	}

	#[test]
	fn test_both_present() {
		let config = layer(Some("xoxb-test"), Some("shh")).resolve().unwrap();
		assert_eq!(config.slack_bot_token.expose(), "xoxb-test");
		assert_eq!(config.slack_signing_secret.expose(), "shh");
	}

	#[test]
	fn test_missing_token() {
		let err = layer(None, Some("shh")).resolve().unwrap_err();
		assert!(matches!(
			err,
			ConfigError::MissingCredential {
				name: "slackBotToken"
			}
		));
	}

	#[test]
	fn test_blank_secret_counts_as_missing() {
		let err = layer(Some("xoxb-test"), Some("   ")).resolve().unwrap_err();
		assert!(matches!(
			err,
			ConfigError::MissingCredential {
				name: "slackSigningSecret"
			}
		));
	}

	#[test]
	fn test_merge_keeps_existing_when_other_absent() {
		let mut base = layer(Some("xoxb-a"), None);
		base.merge(layer(None, Some("shh")));
		let config = base.resolve().unwrap();
		assert_eq!(config.slack_bot_token.expose(), "xoxb-a");
	}

	#[test]
	fn test_debug_does_not_leak() {
		let config = layer(Some("xoxb-test"), Some("shh")).resolve().unwrap();
		let printed = format!("{config:?}");
		assert!(!printed.contains("xoxb-test"));
		assert!(!printed.contains("shh"));
	}
}
