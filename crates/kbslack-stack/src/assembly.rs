// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack assembly: validate the inputs, then declare every resource in
//! dependency order and freeze the result into one template.

use std::path::PathBuf;

use kbslack_stack_config::{SelfInvokeScope, StackConfig, TargetConfig};
use tracing::{info, instrument};

use crate::compute::{self, Asset, ComputeUnit, FunctionInputs};
use crate::edge::{self, EdgeEndpoint};
use crate::error::StackResult;
use crate::permissions::{require_resolved_target, PermissionBoundary};
use crate::secrets::{self, ParameterValues, SecretStore};
use crate::template::{Tag, Template, TemplateBuilder};

pub const TAG_DIVISION: &str = "CT:DIVISION";
pub const TAG_STAGE: &str = "CT:STAGE";
pub const TAG_SERVICE: &str = "CT:SERVICE";
pub const TAG_OWNER: &str = "CT:OWNER";

#[derive(Debug, Clone, Default)]
pub struct SynthOptions {
	/// Directory the function's `code_path` is resolved against.
	pub base_dir: PathBuf,
}

/// Everything declared for one stack, plus the deploy-time secret values
/// that must travel outside the template.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
	pub name: String,
	pub target: TargetConfig,
	pub termination_protection: bool,
	pub template: Template,
	pub parameter_values: ParameterValues,
	pub secrets: SecretStore,
	pub compute: ComputeUnit,
	pub boundary: PermissionBoundary,
	pub edge: EdgeEndpoint,
}

impl SynthesizedStack {
	pub fn tags(&self) -> &[Tag] {
		self.template.tags()
	}

	pub fn tag(&self, key: &str) -> Option<&str> {
		self.tags()
			.iter()
			.find(|t| t.key == key)
			.map(|t| t.value.as_str())
	}
}

pub fn stack_tags(config: &StackConfig) -> Vec<Tag> {
	vec![
		Tag::new(TAG_DIVISION, config.tags.division.as_str()),
		Tag::new(TAG_STAGE, config.environment.name.as_str()),
		Tag::new(TAG_SERVICE, config.tags.service.as_str()),
		Tag::new(TAG_OWNER, config.tags.owner.as_str()),
	]
}

/// Synthesize with asset paths relative to the working directory.
pub fn synthesize(config: &StackConfig) -> StackResult<SynthesizedStack> {
	synthesize_with(config, &SynthOptions::default())
}

#[instrument(skip_all, fields(stack = %config.identity.stack_name))]
pub fn synthesize_with(
	config: &StackConfig,
	options: &SynthOptions,
) -> StackResult<SynthesizedStack> {
	// Nothing is declared until every input checks out.
	secrets::require_credentials(&config.credentials)?;
	require_resolved_target(&config.target)?;
	let asset = Asset::from_directory(
		&options.base_dir.join(&config.function.code_path),
		&config.target,
	)?;

	let mut builder = TemplateBuilder::new(config.identity.description.as_str());
	let mut parameter_values = ParameterValues::new();

	let secrets = secrets::provision(&mut builder, &config.credentials, &mut parameter_values)?;

	let role = compute::provision_role(&mut builder)?;
	let function_name = match config.permissions.self_invoke_scope {
		SelfInvokeScope::OwnFunction => Some(compute::function_name(&config.identity.stack_name)),
		SelfInvokeScope::AnyFunction => None,
	};
	let boundary = PermissionBoundary::design(
		&config.target,
		&config.permissions,
		&secrets,
		function_name.as_deref(),
	)?;
	let policy = boundary.attach(&mut builder, &role, &secrets)?;

	let compute = compute::provision_function(
		&mut builder,
		FunctionInputs {
			config: &config.function,
			stack_name: &config.identity.stack_name,
			self_invoke_scope: config.permissions.self_invoke_scope,
			role,
			policy: &policy,
			secrets: &secrets,
			asset,
		},
	)?;

	let edge = edge::provision(&mut builder, &config.edge, &compute.function, &config.target)?;

	let template = builder.build(stack_tags(config));
	let termination_protection = config.termination_protection();

	info!(
		resources = template.resources().len(),
		target = %config.target.environment_uri(),
		termination_protection,
		asset = %compute.asset.hash,
		"Stack synthesized"
	);

	Ok(SynthesizedStack {
		name: config.identity.stack_name.clone(),
		target: config.target.clone(),
		termination_protection,
		template,
		parameter_values,
		secrets,
		compute,
		boundary,
		edge,
	})
}
