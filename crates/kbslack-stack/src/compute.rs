// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compute unit: the webhook handler function, its execution role and its
//! code asset. The handler logic itself is external; this module only
//! declares what it runs with.

use std::fs;
use std::path::{Path, PathBuf};

use kbslack_stack_config::{FunctionConfig, SelfInvokeScope, TargetConfig};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{StackError, StackResult};
use crate::secrets::SecretStore;
use crate::template::{logical_id, Resource, ResourceRef, TemplateBuilder};

pub const FUNCTION_CONSTRUCT_ID: &str = "SlackBedrockHandler";

pub const BASIC_EXECUTION_POLICY_ARN: &str =
	"arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// Bootstrap qualifier of the asset bucket the deploy tooling publishes to.
pub const ASSET_QUALIFIER: &str = "hnb659fds";

pub const ENV_BOT_TOKEN_SECRET_NAME: &str = "SLACK_BOT_TOKEN_SECRET_NAME";
pub const ENV_SIGNING_SECRET_NAME: &str = "SLACK_SIGNING_SECRET_NAME";
pub const ENV_KNOWLEDGE_BASE_ID: &str = "KNOWLEDGE_BASE_ID";
pub const ENV_MODEL_ARN: &str = "MODEL_ARN";

/// A zipped directory published ahead of the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
	/// SHA-256 of the directory contents.
	pub hash: String,
	pub source_path: PathBuf,
	pub bucket_name: String,
	pub object_key: String,
}

impl Asset {
	pub fn from_directory(path: &Path, target: &TargetConfig) -> StackResult<Self> {
		let hash = hash_directory(path)?;
		Ok(Self {
			bucket_name: format!(
				"cdk-{ASSET_QUALIFIER}-assets-{}-{}",
				target.account, target.region
			),
			object_key: format!("{hash}.zip"),
			source_path: path.to_path_buf(),
			hash,
		})
	}

	pub fn publishing_role_arn(&self, target: &TargetConfig) -> String {
		format!(
			"arn:aws:iam::{}:role/cdk-{ASSET_QUALIFIER}-file-publishing-role-{}-{}",
			target.account, target.account, target.region
		)
	}
}

/// Content hash of a directory tree: relative paths (with `/` separators) in
/// sorted order, each followed by the file length and bytes.
pub fn hash_directory(root: &Path) -> StackResult<String> {
	let metadata = fs::metadata(root).map_err(|source| StackError::Asset {
		path: root.to_path_buf(),
		source,
	})?;
	if !metadata.is_dir() {
		return Err(StackError::AssetNotDirectory {
			path: root.to_path_buf(),
		});
	}

	let mut files = Vec::new();
	collect_files(root, root, &mut files)?;
	files.sort();

	let mut hasher = Sha256::new();
	for relative in files {
		let full = root.join(&relative);
		let bytes = fs::read(&full).map_err(|source| StackError::Asset { path: full, source })?;
		hasher.update(relative.as_bytes());
		hasher.update([0u8]);
		hasher.update((bytes.len() as u64).to_le_bytes());
		hasher.update(&bytes);
	}
	Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> StackResult<()> {
	let entries = fs::read_dir(dir).map_err(|source| StackError::Asset {
		path: dir.to_path_buf(),
		source,
	})?;
	for entry in entries {
		let entry = entry.map_err(|source| StackError::Asset {
			path: dir.to_path_buf(),
			source,
		})?;
		let path = entry.path();
		let metadata = fs::metadata(&path).map_err(|source| StackError::Asset {
			path: path.clone(),
			source,
		})?;
		if metadata.is_dir() {
			collect_files(root, &path, out)?;
		} else {
			let relative = path
				.strip_prefix(root)
				.unwrap_or(&path)
				.components()
				.map(|c| c.as_os_str().to_string_lossy().into_owned())
				.collect::<Vec<_>>()
				.join("/");
			out.push(relative);
		}
	}
	Ok(())
}

/// Physical name given to the function when its own ARN must be known
/// before it exists. Stack names are ASCII, so byte slicing is safe.
pub fn function_name(stack_name: &str) -> String {
	let prefix = &stack_name[..stack_name.len().min(50)];
	format!("{prefix}-SlackHandler")
}

/// The function ARN and its qualified variants, rendered without referencing
/// the function resource.
pub fn function_arns(target: &TargetConfig, name: &str) -> Vec<String> {
	let base = format!(
		"arn:aws:lambda:{}:{}:function:{name}",
		target.region, target.account
	);
	vec![format!("{base}:*"), base]
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeUnit {
	pub role: ResourceRef,
	pub function: ResourceRef,
	pub function_name: Option<String>,
	pub asset: Asset,
	pub timeout_secs: u32,
	pub environment: Vec<(String, String)>,
}

/// Declare the execution role. Policies are attached separately.
pub fn provision_role(builder: &mut TemplateBuilder) -> StackResult<ResourceRef> {
	builder.add(
		Resource::new(
			logical_id(&[FUNCTION_CONSTRUCT_ID, "ServiceRole"]),
			"AWS::IAM::Role",
		)
		.property(
			"AssumeRolePolicyDocument",
			json!({
				"Version": "2012-10-17",
				"Statement": [{
					"Action": "sts:AssumeRole",
					"Effect": "Allow",
					"Principal": { "Service": "lambda.amazonaws.com" }
				}]
			}),
		)
		.property("ManagedPolicyArns", json!([BASIC_EXECUTION_POLICY_ARN]))
		.taggable(),
	)
}

/// Environment handed to the handler. Secret names only, never values.
pub fn handler_environment(
	config: &FunctionConfig,
	secrets: &SecretStore,
) -> Vec<(String, String)> {
	let mut env = vec![
		(
			ENV_BOT_TOKEN_SECRET_NAME.to_string(),
			secrets.bot_token.name.to_string(),
		),
		(
			ENV_SIGNING_SECRET_NAME.to_string(),
			secrets.signing_secret.name.to_string(),
		),
	];
	if let Some(id) = &config.knowledge_base_id {
		env.push((ENV_KNOWLEDGE_BASE_ID.to_string(), id.clone()));
	}
	if let Some(arn) = &config.model_arn {
		env.push((ENV_MODEL_ARN.to_string(), arn.clone()));
	}
	env
}

/// Inputs for [`provision_function`].
pub struct FunctionInputs<'a> {
	pub config: &'a FunctionConfig,
	pub stack_name: &'a str,
	pub self_invoke_scope: SelfInvokeScope,
	pub role: ResourceRef,
	/// The policy holding the permission boundary; the function waits for it.
	pub policy: &'a ResourceRef,
	pub secrets: &'a SecretStore,
	pub asset: Asset,
}

pub fn provision_function(
	builder: &mut TemplateBuilder,
	inputs: FunctionInputs<'_>,
) -> StackResult<ComputeUnit> {
	let FunctionInputs {
		config,
		stack_name,
		self_invoke_scope,
		role,
		policy,
		secrets,
		asset,
	} = inputs;

	let environment = handler_environment(config, secrets);
	let variables: Map<String, Value> = environment
		.iter()
		.map(|(k, v)| (k.clone(), json!(v)))
		.collect();

	let function_name = match self_invoke_scope {
		SelfInvokeScope::OwnFunction => Some(function_name(stack_name)),
		SelfInvokeScope::AnyFunction => None,
	};

	let mut resource = Resource::new(logical_id(&[FUNCTION_CONSTRUCT_ID]), "AWS::Lambda::Function")
		.property(
			"Code",
			json!({ "S3Bucket": asset.bucket_name, "S3Key": asset.object_key }),
		)
		.property("Role", role.get_att("Arn"))
		.property("Runtime", config.runtime.as_str())
		.property("Handler", config.handler.as_str())
		.property("MemorySize", config.memory_mb)
		.property("Timeout", config.timeout_secs)
		.property("Architectures", json!([config.architecture.as_str()]))
		.property("Environment", json!({ "Variables": variables }))
		.depends_on(role.logical_id())
		.depends_on(policy.logical_id())
		.taggable();
	if let Some(name) = &function_name {
		resource = resource.property("FunctionName", name.as_str());
	}

	let function = builder.add(resource)?;

	Ok(ComputeUnit {
		role,
		function,
		function_name,
		asset,
		timeout_secs: config.timeout_secs,
		environment,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn target() -> TargetConfig {
		TargetConfig {
			account: "123456789012".to_string(),
			region: "us-east-1".to_string(),
		}
	}

	#[test]
	fn test_hash_is_stable_and_content_sensitive() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("index.py"), "def handler(e, c): pass\n").unwrap();
		fs::create_dir(dir.path().join("lib")).unwrap();
		fs::write(dir.path().join("lib").join("util.py"), "X = 1\n").unwrap();

		let first = hash_directory(dir.path()).unwrap();
		let second = hash_directory(dir.path()).unwrap();
		assert_eq!(first, second);
		assert_eq!(first.len(), 64);

		fs::write(dir.path().join("lib").join("util.py"), "X = 2\n").unwrap();
		assert_ne!(hash_directory(dir.path()).unwrap(), first);
	}

	#[test]
	fn test_hash_sees_renames() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("a.py"), "x").unwrap();
		let before = hash_directory(dir.path()).unwrap();
		fs::rename(dir.path().join("a.py"), dir.path().join("b.py")).unwrap();
		assert_ne!(hash_directory(dir.path()).unwrap(), before);
	}

	#[test]
	fn test_missing_asset_dir() {
		let err = hash_directory(Path::new("/nonexistent/lambda")).unwrap_err();
		assert!(matches!(err, StackError::Asset { .. }));
	}

	#[test]
	fn test_asset_file_is_not_dir() {
		let file = tempfile::NamedTempFile::new().unwrap();
		let err = hash_directory(file.path()).unwrap_err();
		assert!(matches!(err, StackError::AssetNotDirectory { .. }));
	}

	#[test]
	fn test_asset_locations() {
		let dir = tempfile::tempdir().unwrap();
		let asset = Asset::from_directory(dir.path(), &target()).unwrap();
		assert_eq!(
			asset.bucket_name,
			"cdk-hnb659fds-assets-123456789012-us-east-1"
		);
		assert_eq!(asset.object_key, format!("{}.zip", asset.hash));
		assert_eq!(
			asset.publishing_role_arn(&target()),
			"arn:aws:iam::123456789012:role/cdk-hnb659fds-file-publishing-role-123456789012-us-east-1"
		);
	}

	#[test]
	fn test_function_name_length() {
		let long = "A".repeat(128);
		assert!(function_name(&long).len() <= 64);
		assert_eq!(function_name("Kb"), "Kb-SlackHandler");
	}

	#[test]
	fn test_function_arns() {
		let arns = function_arns(&target(), "Kb-SlackHandler");
		assert_eq!(
			arns,
			vec![
				"arn:aws:lambda:us-east-1:123456789012:function:Kb-SlackHandler:*",
				"arn:aws:lambda:us-east-1:123456789012:function:Kb-SlackHandler",
			]
		);
	}
}
