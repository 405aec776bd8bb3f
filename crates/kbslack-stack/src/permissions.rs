// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission boundary of the handler's execution identity.
//!
//! Four statements, one per consumer need. Each statement lists its actions
//! explicitly and is never merged with another, so every granted action maps
//! back to exactly one [`Purpose`]. [`PermissionBoundary::audit`] re-checks
//! these rules on the finished statements before they are attached.

use std::collections::BTreeSet;
use std::fmt;

use kbslack_stack_config::{
	is_valid_account, is_valid_region, PermissionsConfig, SelfInvokeScope, TargetConfig,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::compute::{function_arns, FUNCTION_CONSTRUCT_ID};
use crate::error::{StackError, StackResult};
use crate::secrets::SecretStore;
use crate::template::{logical_id, Resource, ResourceRef, TemplateBuilder};

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Purpose {
	Retrieval,
	Invocation,
	SecretRead,
	SelfInvoke,
}

impl Purpose {
	pub const ALL: [Purpose; 4] = [
		Purpose::Retrieval,
		Purpose::Invocation,
		Purpose::SecretRead,
		Purpose::SelfInvoke,
	];

	/// Statement id; IAM allows alphanumerics only.
	pub fn sid(&self) -> &'static str {
		match self {
			Purpose::Retrieval => "KnowledgeBaseRetrieval",
			Purpose::Invocation => "ModelInvocation",
			Purpose::SecretRead => "SecretRead",
			Purpose::SelfInvoke => "SelfInvoke",
		}
	}

	pub fn from_sid(sid: &str) -> Option<Self> {
		Purpose::ALL.into_iter().find(|p| p.sid() == sid)
	}

	/// Purposes whose resources must never be a bare `*`.
	fn requires_scoped_resources(&self) -> bool {
		!matches!(self, Purpose::SelfInvoke)
	}
}

impl fmt::Display for Purpose {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.sid())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
	Allow,
	Deny,
}

impl Effect {
	pub fn as_str(&self) -> &'static str {
		match self {
			Effect::Allow => "Allow",
			Effect::Deny => "Deny",
		}
	}
}

pub const RETRIEVAL_ACTIONS: [&str; 4] = [
	"bedrock:RetrieveAndGenerate",
	"bedrock:Retrieve",
	"bedrock:Query",
	"bedrock:GetInferenceProfile",
];
pub const INVOCATION_ACTIONS: [&str; 1] = ["bedrock:InvokeModel"];
pub const SECRET_READ_ACTIONS: [&str; 1] = ["secretsmanager:GetSecretValue"];
pub const SELF_INVOKE_ACTIONS: [&str; 2] = ["lambda:InvokeFunction", "lambda:GetFunction"];

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
	pub purpose: Purpose,
	pub effect: Effect,
	pub actions: Vec<String>,
	/// ARN strings or intrinsics that resolve to ARNs.
	pub resources: Vec<Value>,
}

impl PolicyStatement {
	fn allow(purpose: Purpose, actions: &[&str], resources: Vec<Value>) -> Self {
		Self {
			purpose,
			effect: Effect::Allow,
			actions: actions.iter().map(|a| a.to_string()).collect(),
			resources,
		}
	}

	pub fn has_wildcard_resource(&self) -> bool {
		self.resources.iter().any(|r| r.as_str() == Some("*"))
	}

	pub fn to_json(&self) -> Value {
		json!({
			"Sid": self.purpose.sid(),
			"Effect": self.effect.as_str(),
			"Action": self.actions,
			"Resource": self.resources,
		})
	}
}

/// Rules a boundary must satisfy before it is attached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
	#[error("expected one statement per purpose, found {found:?}")]
	PurposeSet { found: Vec<Purpose> },

	#[error("{purpose} grants no actions")]
	EmptyActions { purpose: Purpose },

	#[error("{purpose} grants wildcard action '{action}'")]
	WildcardAction { purpose: Purpose, action: String },

	#[error("{purpose} is granted on an unscoped '*' resource")]
	UnscopedResource { purpose: Purpose },

	#[error("{purpose} statement must allow, not deny")]
	NotAllow { purpose: Purpose },

	#[error("secret read must cover exactly this stack's secrets")]
	SecretScope,
}

/// Fail unless account and region are concrete values an ARN can carry.
pub fn require_resolved_target(target: &TargetConfig) -> StackResult<()> {
	if !is_valid_account(&target.account) {
		return Err(StackError::UnresolvedEnvironment {
			field: "account",
			value: target.account.clone(),
		});
	}
	if !is_valid_region(&target.region) {
		return Err(StackError::UnresolvedEnvironment {
			field: "region",
			value: target.region.clone(),
		});
	}
	Ok(())
}

/// Renders regional ARNs once the deploy target is known to be concrete.
struct ArnScope<'a> {
	account: &'a str,
	region: &'a str,
}

impl<'a> ArnScope<'a> {
	fn new(target: &'a TargetConfig) -> StackResult<Self> {
		require_resolved_target(target)?;
		Ok(Self {
			account: &target.account,
			region: &target.region,
		})
	}

	fn knowledge_bases(&self) -> String {
		format!(
			"arn:aws:bedrock:{}:{}:knowledge-base/*",
			self.region, self.account
		)
	}

	fn inference_profiles(&self) -> String {
		format!(
			"arn:aws:bedrock:{}:{}:inference-profile/*",
			self.region, self.account
		)
	}
}

fn foundation_models(region: &str) -> String {
	format!("arn:aws:bedrock:{region}::foundation-model/*")
}

fn strings(values: impl IntoIterator<Item = String>) -> Vec<Value> {
	let mut seen = BTreeSet::new();
	values
		.into_iter()
		.filter(|v| seen.insert(v.clone()))
		.map(Value::String)
		.collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionBoundary {
	statements: Vec<PolicyStatement>,
}

impl PermissionBoundary {
	/// Build the four purpose statements for this deploy target.
	///
	/// `function_name` is the handler's physical name when the self-invoke
	/// grant is narrowed to it.
	pub fn design(
		target: &TargetConfig,
		permissions: &PermissionsConfig,
		secrets: &SecretStore,
		function_name: Option<&str>,
	) -> StackResult<Self> {
		let scope = ArnScope::new(target)?;
		for region in &permissions.model_regions {
			if !is_valid_region(region) {
				return Err(StackError::UnresolvedEnvironment {
					field: "model region",
					value: region.clone(),
				});
			}
		}

		// Knowledge base is single-region; models are reachable in every allowed region.
		let retrieval = strings(
			std::iter::once(scope.knowledge_bases())
				.chain(permissions.model_regions.iter().map(|r| foundation_models(r)))
				.chain(std::iter::once(scope.inference_profiles())),
		);

		let invocation = strings(
			std::iter::once(foundation_models(scope.region))
				.chain(permissions.model_regions.iter().map(|r| foundation_models(r)))
				.chain(std::iter::once(scope.inference_profiles())),
		);

		let self_invoke = match (permissions.self_invoke_scope, function_name) {
			(SelfInvokeScope::OwnFunction, Some(name)) => strings(function_arns(target, name)),
			(SelfInvokeScope::OwnFunction, None) => {
				return Err(StackError::PolicyAudit(PolicyViolation::UnscopedResource {
					purpose: Purpose::SelfInvoke,
				}))
			}
			(SelfInvokeScope::AnyFunction, _) => {
				warn!(
					actions = ?SELF_INVOKE_ACTIONS,
					"self-invoke grant is not narrowed to the handler; any function in the account may be invoked"
				);
				vec![json!("*")]
			}
		};

		Ok(Self {
			statements: vec![
				PolicyStatement::allow(Purpose::Retrieval, &RETRIEVAL_ACTIONS, retrieval),
				PolicyStatement::allow(Purpose::Invocation, &INVOCATION_ACTIONS, invocation),
				PolicyStatement::allow(Purpose::SecretRead, &SECRET_READ_ACTIONS, secrets.arns()),
				PolicyStatement::allow(Purpose::SelfInvoke, &SELF_INVOKE_ACTIONS, self_invoke),
			],
		})
	}

	pub fn from_statements(statements: Vec<PolicyStatement>) -> Self {
		Self { statements }
	}

	pub fn statements(&self) -> &[PolicyStatement] {
		&self.statements
	}

	pub fn statement(&self, purpose: Purpose) -> Option<&PolicyStatement> {
		self.statements.iter().find(|s| s.purpose == purpose)
	}

	pub fn purposes(&self) -> Vec<Purpose> {
		self.statements.iter().map(|s| s.purpose).collect()
	}

	/// Check the least-privilege rules against the secrets this stack owns.
	pub fn audit(&self, secrets: &SecretStore) -> Result<(), PolicyViolation> {
		let mut found = self.purposes();
		found.sort();
		if found != Purpose::ALL {
			return Err(PolicyViolation::PurposeSet { found });
		}

		for statement in &self.statements {
			let purpose = statement.purpose;
			if statement.effect != Effect::Allow {
				return Err(PolicyViolation::NotAllow { purpose });
			}
			if statement.actions.is_empty() {
				return Err(PolicyViolation::EmptyActions { purpose });
			}
			if let Some(action) = statement.actions.iter().find(|a| a.contains('*')) {
				return Err(PolicyViolation::WildcardAction {
					purpose,
					action: action.clone(),
				});
			}
			if purpose.requires_scoped_resources() && statement.has_wildcard_resource() {
				return Err(PolicyViolation::UnscopedResource { purpose });
			}
		}

		let granted = self
			.statement(Purpose::SecretRead)
			.map(|s| s.resources.clone())
			.unwrap_or_default();
		let expected = secrets.arns();
		let same_set = granted.len() == expected.len()
			&& expected.iter().all(|arn| granted.contains(arn));
		if !same_set {
			return Err(PolicyViolation::SecretScope);
		}

		Ok(())
	}

	pub fn to_policy_document(&self) -> Value {
		let statements: Vec<Value> = self.statements.iter().map(|s| s.to_json()).collect();
		json!({ "Version": POLICY_VERSION, "Statement": statements })
	}

	/// Audit, then attach as one policy on `role`.
	pub fn attach(
		&self,
		builder: &mut TemplateBuilder,
		role: &ResourceRef,
		secrets: &SecretStore,
	) -> StackResult<ResourceRef> {
		self.audit(secrets)?;
		let id = logical_id(&[FUNCTION_CONSTRUCT_ID, "ServiceRole", "DefaultPolicy"]);
		builder.add(
			Resource::new(id.clone(), "AWS::IAM::Policy")
				.property("PolicyName", id)
				.property("PolicyDocument", self.to_policy_document())
				.property("Roles", json!([role.ref_()])),
		)
	}
}
