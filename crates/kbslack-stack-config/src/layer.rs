// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by each source and merged by precedence.

use serde::Deserialize;

use crate::sections::{
	CredentialsConfigLayer, EdgeConfigLayer, EnvironmentConfigLayer, FunctionConfigLayer,
	IdentityConfigLayer, PermissionsConfigLayer, TagsConfigLayer, TargetConfigLayer,
};

/// One source's view of the configuration. `None` sections contribute nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StackConfigLayer {
	#[serde(default, rename = "stack")]
	pub identity: Option<IdentityConfigLayer>,
	#[serde(default)]
	pub credentials: Option<CredentialsConfigLayer>,
	#[serde(default)]
	pub target: Option<TargetConfigLayer>,
	#[serde(default)]
	pub environment: Option<EnvironmentConfigLayer>,
	#[serde(default)]
	pub tags: Option<TagsConfigLayer>,
	#[serde(default)]
	pub function: Option<FunctionConfigLayer>,
	#[serde(default)]
	pub edge: Option<EdgeConfigLayer>,
	#[serde(default)]
	pub permissions: Option<PermissionsConfigLayer>,
}

macro_rules! merge_section {
	($self:ident, $other:ident, $field:ident) => {
		if let Some(next) = $other.$field {
			match &mut $self.$field {
				Some(current) => current.merge(next),
				None => $self.$field = Some(next),
			}
		}
	};
}

impl StackConfigLayer {
	/// Merge `other` on top of `self`; values present in `other` win.
	pub fn merge(&mut self, other: StackConfigLayer) {
		merge_section!(self, other, identity);
		merge_section!(self, other, credentials);
		merge_section!(self, other, target);
		merge_section!(self, other, environment);
		merge_section!(self, other, tags);
		merge_section!(self, other, function);
		merge_section!(self, other, edge);
		merge_section!(self, other, permissions);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_section_fields() {
		let mut base = StackConfigLayer {
			target: Some(TargetConfigLayer {
				account: Some("111111111111".to_string()),
				region: Some("us-west-2".to_string()),
			}),
			..Default::default()
		};
		base.merge(StackConfigLayer {
			target: Some(TargetConfigLayer {
				account: None,
				region: Some("eu-west-1".to_string()),
			}),
			..Default::default()
		});
		let target = base.target.unwrap();
		assert_eq!(target.account.as_deref(), Some("111111111111"));
		assert_eq!(target.region.as_deref(), Some("eu-west-1"));
	}

	#[test]
	fn test_merge_into_empty_section() {
		let mut base = StackConfigLayer::default();
		base.merge(StackConfigLayer {
			environment: Some(EnvironmentConfigLayer {
				name: Some("prod".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(base.environment.unwrap().name.as_deref(), Some("prod"));
	}

	#[test]
	fn test_parse_toml() {
		let layer: StackConfigLayer = toml::from_str(
			r#"
			[stack]
			stack_name = "SlackKb"

			[target]
			account = "123456789012"

			[edge]
			rate_limit = 5.0
			burst_limit = 8

			[permissions]
			self_invoke_scope = "own-function"
			"#,
		)
		.unwrap();
		assert_eq!(layer.identity.unwrap().stack_name.as_deref(), Some("SlackKb"));
		assert_eq!(layer.edge.as_ref().unwrap().burst_limit, Some(8));
		assert!(layer.credentials.is_none());
	}
}
