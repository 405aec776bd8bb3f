// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Immutable resource descriptors and the template they are synthesized into.
//!
//! Resources are added to a [`TemplateBuilder`] one at a time. Every `Ref`,
//! `Fn::GetAtt` and `DependsOn` is checked on insertion, so a resource can
//! only point at something added before it: insertion order is always a
//! valid creation order and the finished [`Template`] is submitted as one
//! unit.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{StackError, StackResult};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// `Ref` intrinsic.
pub fn ref_(logical_id: &str) -> Value {
	json!({ "Ref": logical_id })
}

/// `Fn::GetAtt` intrinsic.
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
	json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `Fn::Join` intrinsic.
pub fn join(separator: &str, parts: Vec<Value>) -> Value {
	json!({ "Fn::Join": [separator, parts] })
}

/// Deterministic logical id for a construct path: the alphanumeric path
/// components followed by 8 hex digits of the path's SHA-256.
pub fn logical_id(path: &[&str]) -> String {
	let human: String = path
		.iter()
		.flat_map(|component| component.chars())
		.filter(|c| c.is_ascii_alphanumeric())
		.collect();
	let digest = Sha256::digest(path.join("/").as_bytes());
	format!("{human}{}", hex::encode_upper(&digest[..4]))
}

/// A key/value tag applied to every taggable resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag {
	pub key: String,
	pub value: String,
}

impl Tag {
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: value.into(),
		}
	}
}

/// One resource declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
	logical_id: String,
	resource_type: &'static str,
	properties: Map<String, Value>,
	depends_on: BTreeSet<String>,
	taggable: bool,
}

impl Resource {
	pub fn new(logical_id: impl Into<String>, resource_type: &'static str) -> Self {
		Self {
			logical_id: logical_id.into(),
			resource_type,
			properties: Map::new(),
			depends_on: BTreeSet::new(),
			taggable: false,
		}
	}

	pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
		self.properties.insert(key.to_string(), value.into());
		self
	}

	pub fn depends_on(mut self, logical_id: &str) -> Self {
		self.depends_on.insert(logical_id.to_string());
		self
	}

	/// Mark this resource as accepting a `Tags` list.
	pub fn taggable(mut self) -> Self {
		self.taggable = true;
		self
	}

	pub fn logical_id(&self) -> &str {
		&self.logical_id
	}

	pub fn resource_type(&self) -> &'static str {
		self.resource_type
	}

	pub fn properties(&self) -> &Map<String, Value> {
		&self.properties
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.properties.get(key)
	}

	pub fn dependencies(&self) -> &BTreeSet<String> {
		&self.depends_on
	}

	pub fn is_taggable(&self) -> bool {
		self.taggable
	}

	/// Logical ids this resource points at through intrinsics.
	pub fn references(&self) -> BTreeSet<String> {
		let mut found = BTreeSet::new();
		for value in self.properties.values() {
			collect_references(value, &mut found);
		}
		found
	}

	fn to_json(&self, tags: &[Tag]) -> Value {
		let mut properties = self.properties.clone();
		if self.taggable && !tags.is_empty() {
			let rendered: Vec<Value> = tags
				.iter()
				.map(|t| json!({ "Key": t.key, "Value": t.value }))
				.collect();
			properties.insert("Tags".to_string(), Value::Array(rendered));
		}

		let mut body = Map::new();
		body.insert("Type".to_string(), json!(self.resource_type));
		if !properties.is_empty() {
			body.insert("Properties".to_string(), Value::Object(properties));
		}
		if !self.depends_on.is_empty() {
			body.insert("DependsOn".to_string(), json!(self.depends_on));
		}
		Value::Object(body)
	}
}

fn collect_references(value: &Value, found: &mut BTreeSet<String>) {
	match value {
		Value::Object(map) => {
			if let Some(Value::String(target)) = map.get("Ref") {
				if !target.starts_with("AWS::") {
					found.insert(target.clone());
				}
			}
			if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
				if let Some(Value::String(target)) = parts.first() {
					found.insert(target.clone());
				}
			}
			for nested in map.values() {
				collect_references(nested, found);
			}
		}
		Value::Array(items) => {
			for item in items {
				collect_references(item, found);
			}
		}
		_ => {}
	}
}

/// Handle to a resource already added to a builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
	logical_id: String,
}

impl ResourceRef {
	pub fn logical_id(&self) -> &str {
		&self.logical_id
	}

	pub fn ref_(&self) -> Value {
		ref_(&self.logical_id)
	}

	pub fn get_att(&self, attribute: &str) -> Value {
		get_att(&self.logical_id, attribute)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
	pub logical_id: String,
	pub description: String,
	/// Masked in consoles and API responses.
	pub no_echo: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
	pub logical_id: String,
	pub value: Value,
	pub description: String,
}

/// Collects resources in dependency order.
#[derive(Debug, Default)]
pub struct TemplateBuilder {
	description: String,
	parameters: BTreeMap<String, Parameter>,
	resources: Vec<Resource>,
	index: HashMap<String, usize>,
	outputs: BTreeMap<String, Output>,
}

impl TemplateBuilder {
	pub fn new(description: impl Into<String>) -> Self {
		Self {
			description: description.into(),
			..Default::default()
		}
	}

	fn is_defined(&self, logical_id: &str) -> bool {
		self.index.contains_key(logical_id) || self.parameters.contains_key(logical_id)
	}

	pub fn add_parameter(&mut self, parameter: Parameter) -> StackResult<Value> {
		if self.is_defined(&parameter.logical_id) {
			return Err(StackError::DuplicateLogicalId(parameter.logical_id));
		}
		let reference = ref_(&parameter.logical_id);
		debug!(logical_id = %parameter.logical_id, no_echo = parameter.no_echo, "parameter declared");
		self.parameters
			.insert(parameter.logical_id.clone(), parameter);
		Ok(reference)
	}

	/// Add a resource whose references all point at earlier definitions.
	pub fn add(&mut self, resource: Resource) -> StackResult<ResourceRef> {
		if self.is_defined(&resource.logical_id) {
			return Err(StackError::DuplicateLogicalId(resource.logical_id));
		}

		let pointers = resource
			.references()
			.into_iter()
			.chain(resource.depends_on.iter().cloned());
		for target in pointers {
			let known = if resource.depends_on.contains(&target) {
				self.index.contains_key(&target)
			} else {
				self.is_defined(&target)
			};
			if !known {
				return Err(StackError::DanglingReference {
					from: resource.logical_id.clone(),
					to: target,
				});
			}
		}

		debug!(
			logical_id = %resource.logical_id,
			resource_type = resource.resource_type,
			"resource declared"
		);
		let handle = ResourceRef {
			logical_id: resource.logical_id.clone(),
		};
		self.index
			.insert(resource.logical_id.clone(), self.resources.len());
		self.resources.push(resource);
		Ok(handle)
	}

	pub fn add_output(&mut self, output: Output) -> StackResult<()> {
		if self.outputs.contains_key(&output.logical_id) {
			return Err(StackError::DuplicateLogicalId(output.logical_id));
		}
		let mut found = BTreeSet::new();
		collect_references(&output.value, &mut found);
		if let Some(missing) = found.into_iter().find(|id| !self.is_defined(id)) {
			return Err(StackError::DanglingReference {
				from: output.logical_id,
				to: missing,
			});
		}
		self.outputs.insert(output.logical_id.clone(), output);
		Ok(())
	}

	pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
		self.index.get(logical_id).map(|&i| &self.resources[i])
	}

	/// Freeze the builder. Tags are sorted by key and deduplicated, last write wins.
	pub fn build(self, tags: Vec<Tag>) -> Template {
		let mut by_key: BTreeMap<String, String> = BTreeMap::new();
		for tag in tags {
			by_key.insert(tag.key, tag.value);
		}
		Template {
			description: self.description,
			parameters: self.parameters,
			resources: self.resources,
			outputs: self.outputs,
			tags: by_key
				.into_iter()
				.map(|(key, value)| Tag { key, value })
				.collect(),
		}
	}
}

/// A finished, immutable resource graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
	description: String,
	parameters: BTreeMap<String, Parameter>,
	resources: Vec<Resource>,
	outputs: BTreeMap<String, Output>,
	tags: Vec<Tag>,
}

impl Template {
	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn resources(&self) -> &[Resource] {
		&self.resources
	}

	pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
		self.resources.iter().find(|r| r.logical_id == logical_id)
	}

	pub fn resources_of_type<'a>(
		&'a self,
		resource_type: &'a str,
	) -> impl Iterator<Item = &'a Resource> + 'a {
		self.resources
			.iter()
			.filter(move |r| r.resource_type == resource_type)
	}

	pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
		self.parameters.values()
	}

	pub fn outputs(&self) -> impl Iterator<Item = &Output> {
		self.outputs.values()
	}

	pub fn output(&self, logical_id: &str) -> Option<&Output> {
		self.outputs.get(logical_id)
	}

	pub fn tags(&self) -> &[Tag] {
		&self.tags
	}

	/// Logical ids in the order they must be created.
	pub fn creation_order(&self) -> Vec<&str> {
		self.resources.iter().map(|r| r.logical_id.as_str()).collect()
	}

	pub fn to_json(&self) -> Value {
		let mut root = Map::new();
		root.insert(
			"AWSTemplateFormatVersion".to_string(),
			json!(TEMPLATE_FORMAT_VERSION),
		);
		root.insert("Description".to_string(), json!(self.description));

		if !self.parameters.is_empty() {
			let parameters: Map<String, Value> = self
				.parameters
				.values()
				.map(|p| {
					let mut body = json!({ "Type": "String", "Description": p.description });
					if p.no_echo {
						body["NoEcho"] = json!(true);
					}
					(p.logical_id.clone(), body)
				})
				.collect();
			root.insert("Parameters".to_string(), Value::Object(parameters));
		}

		let resources: Map<String, Value> = self
			.resources
			.iter()
			.map(|r| (r.logical_id.clone(), r.to_json(&self.tags)))
			.collect();
		root.insert("Resources".to_string(), Value::Object(resources));

		if !self.outputs.is_empty() {
			let outputs: Map<String, Value> = self
				.outputs
				.values()
				.map(|o| {
					(
						o.logical_id.clone(),
						json!({ "Value": o.value, "Description": o.description }),
					)
				})
				.collect();
			root.insert("Outputs".to_string(), Value::Object(outputs));
		}

		Value::Object(root)
	}

	pub fn to_string_pretty(&self) -> StackResult<String> {
		serde_json::to_string_pretty(&self.to_json()).map_err(|source| StackError::Serialize {
			what: "template",
			source,
		})
	}
}
