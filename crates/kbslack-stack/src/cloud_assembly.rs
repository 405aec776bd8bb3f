// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-disk cloud assembly: the directory deploy tooling consumes.
//!
//! ```text
//! <out>/manifest.json
//! <out>/<StackName>.template.json
//! <out>/<StackName>.assets.json
//! ```
//!
//! Secret values are never part of the assembly. They are written only by
//! [`write_parameter_values`], to a path the caller chooses.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::assembly::SynthesizedStack;
use crate::edge::URL_OUTPUT_ID;
use crate::error::{StackError, StackResult};

pub const MANIFEST_VERSION: &str = "36.0.0";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
	pub version: String,
	pub artifacts: BTreeMap<String, Artifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
	#[serde(rename = "type")]
	pub artifact_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub environment: Option<String>,
	pub properties: ArtifactProperties,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub dependencies: Vec<String>,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub metadata: BTreeMap<String, Vec<MetadataEntry>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArtifactProperties {
	#[serde(rename_all = "camelCase")]
	Stack {
		template_file: String,
		termination_protection: bool,
		tags: BTreeMap<String, String>,
		stack_name: String,
	},
	AssetManifest {
		file: String,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
	#[serde(rename = "type")]
	pub entry_type: String,
	pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
	pub version: String,
	pub files: BTreeMap<String, FileAsset>,
	pub docker_images: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAsset {
	pub source: FileAssetSource,
	pub destinations: BTreeMap<String, FileAssetDestination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAssetSource {
	pub path: String,
	pub packaging: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssetDestination {
	pub bucket_name: String,
	pub object_key: String,
	pub region: String,
	pub assume_role_arn: String,
}

/// Paths of the files one [`write`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAssembly {
	pub manifest: PathBuf,
	pub template: PathBuf,
	pub assets: PathBuf,
}

pub fn template_file_name(stack: &SynthesizedStack) -> String {
	format!("{}.template.json", stack.name)
}

pub fn assets_file_name(stack: &SynthesizedStack) -> String {
	format!("{}.assets.json", stack.name)
}

pub fn manifest(stack: &SynthesizedStack) -> Manifest {
	let assets_id = format!("{}.assets", stack.name);
	let tags = stack
		.tags()
		.iter()
		.map(|t| (t.key.clone(), t.value.clone()))
		.collect();

	let mut metadata = BTreeMap::new();
	metadata.insert(
		format!("/{}/{}", stack.name, URL_OUTPUT_ID),
		vec![MetadataEntry {
			entry_type: "aws:cdk:logicalId".to_string(),
			data: stack.edge.url_output.clone(),
		}],
	);

	let mut artifacts = BTreeMap::new();
	artifacts.insert(
		assets_id.clone(),
		Artifact {
			artifact_type: "cdk:asset-manifest".to_string(),
			environment: None,
			properties: ArtifactProperties::AssetManifest {
				file: assets_file_name(stack),
			},
			dependencies: Vec::new(),
			metadata: BTreeMap::new(),
			display_name: None,
		},
	);
	artifacts.insert(
		stack.name.clone(),
		Artifact {
			artifact_type: "aws:cloudformation:stack".to_string(),
			environment: Some(stack.target.environment_uri()),
			properties: ArtifactProperties::Stack {
				template_file: template_file_name(stack),
				termination_protection: stack.termination_protection,
				tags,
				stack_name: stack.name.clone(),
			},
			dependencies: vec![assets_id],
			metadata,
			display_name: Some(stack.name.clone()),
		},
	);

	Manifest {
		version: MANIFEST_VERSION.to_string(),
		artifacts,
	}
}

pub fn asset_manifest(stack: &SynthesizedStack) -> AssetManifest {
	let asset = &stack.compute.asset;
	let target = &stack.target;

	let mut destinations = BTreeMap::new();
	destinations.insert(
		format!("{}-{}", target.account, target.region),
		FileAssetDestination {
			bucket_name: asset.bucket_name.clone(),
			object_key: asset.object_key.clone(),
			region: target.region.clone(),
			assume_role_arn: asset.publishing_role_arn(target),
		},
	);

	let mut files = BTreeMap::new();
	files.insert(
		asset.hash.clone(),
		FileAsset {
			source: FileAssetSource {
				path: asset.source_path.display().to_string(),
				packaging: "zip".to_string(),
			},
			destinations,
		},
	);

	AssetManifest {
		version: MANIFEST_VERSION.to_string(),
		files,
		docker_images: BTreeMap::new(),
	}
}

fn write_json(path: PathBuf, value: &impl Serialize, what: &'static str) -> StackResult<PathBuf> {
	let mut rendered = serde_json::to_string_pretty(value)
		.map_err(|source| StackError::Serialize { what, source })?;
	rendered.push('\n');
	fs::write(&path, rendered).map_err(|source| StackError::Write {
		path: path.clone(),
		source,
	})?;
	Ok(path)
}

/// Write the template, asset manifest and assembly manifest into `out_dir`.
#[instrument(skip_all, fields(stack = %stack.name, out_dir = %out_dir.display()))]
pub fn write(stack: &SynthesizedStack, out_dir: &Path) -> StackResult<CloudAssembly> {
	fs::create_dir_all(out_dir).map_err(|source| StackError::Write {
		path: out_dir.to_path_buf(),
		source,
	})?;

	let template = write_json(
		out_dir.join(template_file_name(stack)),
		&stack.template.to_json(),
		"template",
	)?;
	let assets = write_json(
		out_dir.join(assets_file_name(stack)),
		&asset_manifest(stack),
		"asset manifest",
	)?;
	let manifest = write_json(out_dir.join(MANIFEST_FILE), &manifest(stack), "manifest")?;

	info!(template = %template.display(), "Cloud assembly written");
	Ok(CloudAssembly {
		manifest,
		template,
		assets,
	})
}

/// Parameter overrides carrying the secret payloads, in the
/// `[{ParameterKey, ParameterValue}]` shape deploy commands accept.
fn parameter_overrides(stack: &SynthesizedStack) -> Value {
	let entries: Vec<Value> = stack
		.parameter_values
		.iter()
		.map(|(key, value)| json!({ "ParameterKey": key, "ParameterValue": value.expose() }))
		.collect();
	Value::Array(entries)
}

/// Write the secret parameter values, readable by the owner only.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_parameter_values(stack: &SynthesizedStack, path: &Path) -> StackResult<()> {
	let write_err = |source: std::io::Error| StackError::Write {
		path: path.to_path_buf(),
		source,
	};

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(write_err)?;
	}

	let content = serde_json::to_string_pretty(&parameter_overrides(stack)).map_err(|source| {
		StackError::Serialize {
			what: "parameter values",
			source,
		}
	})?;

	#[cfg(unix)]
	{
		use std::io::Write;
		use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

		let mut file = fs::OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.mode(0o600)
			.open(path)
			.map_err(write_err)?;
		// `mode` only applies on create; an existing file keeps its old bits.
		file.set_permissions(fs::Permissions::from_mode(0o600))
			.map_err(write_err)?;
		file.write_all(content.as_bytes()).map_err(write_err)?;
	}

	#[cfg(not(unix))]
	{
		fs::write(path, content).map_err(write_err)?;
	}

	info!(parameters = stack.parameter_values.len(), "Secret parameter values written");
	Ok(())
}
