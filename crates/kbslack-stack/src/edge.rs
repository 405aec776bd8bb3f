// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Edge endpoint: a public REST API with one route.
//!
//! `POST /<path>` is a transparent proxy to the handler. `OPTIONS /<path>`
//! is answered by the edge itself with the CORS headers the chat platform
//! needs. Neither method authenticates; the handler verifies the request
//! signature (see [`crate::contract`]). A stage-wide throttle sheds load
//! before anything is invoked.

use std::fmt;

use kbslack_common_webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use kbslack_stack_config::{EdgeConfig, TargetConfig};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::admission::EdgeModel;
use crate::error::StackResult;
use crate::permissions::require_resolved_target;
use crate::template::{join, logical_id, ref_, Output, Resource, ResourceRef, TemplateBuilder};

pub const API_CONSTRUCT_ID: &str = "slack-bedrock-api";
pub const API_DESCRIPTION: &str = "Slack integration for existing Bedrock knowledge base";
pub const URL_OUTPUT_ID: &str = "APIUrl";
pub const URL_OUTPUT_DESCRIPTION: &str = "The public URL of the API Gateway.";

/// Stage the console uses for "Test" invocations.
const TEST_INVOKE_STAGE: &str = "test-invoke-stage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
	Get,
	Head,
	Post,
	Put,
	Patch,
	Delete,
	Options,
}

impl HttpMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Head => "HEAD",
			HttpMethod::Post => "POST",
			HttpMethod::Put => "PUT",
			HttpMethod::Patch => "PATCH",
			HttpMethod::Delete => "DELETE",
			HttpMethod::Options => "OPTIONS",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s.to_ascii_uppercase().as_str() {
			"GET" => Some(HttpMethod::Get),
			"HEAD" => Some(HttpMethod::Head),
			"POST" => Some(HttpMethod::Post),
			"PUT" => Some(HttpMethod::Put),
			"PATCH" => Some(HttpMethod::Patch),
			"DELETE" => Some(HttpMethod::Delete),
			"OPTIONS" => Some(HttpMethod::Options),
			_ => None,
		}
	}
}

impl fmt::Display for HttpMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Authorization performed by the edge before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationType {
	/// Anyone may call; authenticity is the handler's job.
	None,
}

impl AuthorizationType {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuthorizationType::None => "NONE",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
	pub allow_origins: Vec<String>,
	pub allow_methods: Vec<HttpMethod>,
	pub allow_headers: Vec<String>,
}

impl CorsPolicy {
	/// What the chat platform's signed requests need.
	pub fn slack() -> Self {
		Self {
			allow_origins: vec!["*".to_string()],
			allow_methods: vec![HttpMethod::Post],
			allow_headers: vec![
				"Content-Type".to_string(),
				SIGNATURE_HEADER.to_string(),
				TIMESTAMP_HEADER.to_string(),
			],
		}
	}

	pub fn response_headers(&self) -> Vec<(&'static str, String)> {
		let methods: Vec<&str> = self.allow_methods.iter().map(|m| m.as_str()).collect();
		vec![
			("Access-Control-Allow-Headers", self.allow_headers.join(",")),
			("Access-Control-Allow-Origin", self.allow_origins.join(",")),
			("Access-Control-Allow-Methods", methods.join(",")),
		]
	}

	fn method_response_parameters(&self) -> Value {
		let params: Map<String, Value> = self
			.response_headers()
			.into_iter()
			.map(|(name, _)| (format!("method.response.header.{name}"), json!(true)))
			.collect();
		Value::Object(params)
	}

	fn integration_response_parameters(&self) -> Value {
		let params: Map<String, Value> = self
			.response_headers()
			.into_iter()
			.map(|(name, value)| (format!("method.response.header.{name}"), json!(format!("'{value}'"))))
			.collect();
		Value::Object(params)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integration {
	/// Whole request to the function, whole response back.
	LambdaProxy { function: ResourceRef },
	/// Answered by the edge.
	Mock { status: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
	pub method: HttpMethod,
	pub path: String,
	pub authorization: AuthorizationType,
	pub integration: Integration,
	pub cors: Option<CorsPolicy>,
	pub resource: ResourceRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeEndpoint {
	pub api: ResourceRef,
	pub path_resource: ResourceRef,
	pub routes: Vec<Route>,
	pub deployment: ResourceRef,
	pub stage: ResourceRef,
	pub invoke_permissions: Vec<ResourceRef>,
	pub url_output: String,
	pub stage_name: String,
	pub path: String,
	pub rate_limit: f64,
	pub burst_limit: u32,
	pub cors: CorsPolicy,
}

impl EdgeEndpoint {
	pub fn route(&self, method: HttpMethod) -> Option<&Route> {
		self.routes.iter().find(|r| r.method == method)
	}

	/// Fresh admission model with a full bucket.
	pub fn admission_model(&self) -> EdgeModel {
		EdgeModel::new(&self.path, self.cors.clone(), self.rate_limit, self.burst_limit)
	}
}

fn execute_api_arn(target: &TargetConfig, api: &ResourceRef, stage: Value, path: &str) -> Value {
	join(
		"",
		vec![
			json!(format!(
				"arn:aws:execute-api:{}:{}:",
				target.region, target.account
			)),
			api.ref_(),
			json!("/"),
			stage,
			json!(format!("/{}/{path}", HttpMethod::Post)),
		],
	)
}

/// Declare the API, its single route, the deployment, the throttled stage
/// and the function permissions, then the URL output.
pub fn provision(
	builder: &mut TemplateBuilder,
	config: &EdgeConfig,
	function: &ResourceRef,
	target: &TargetConfig,
) -> StackResult<EdgeEndpoint> {
	require_resolved_target(target)?;
	let cors = CorsPolicy::slack();

	let api = builder.add(
		Resource::new(logical_id(&[API_CONSTRUCT_ID]), "AWS::ApiGateway::RestApi")
			.property("Name", config.api_name.as_str())
			.property("Description", API_DESCRIPTION)
			.taggable(),
	)?;

	let path_resource = builder.add(
		Resource::new(
			logical_id(&[API_CONSTRUCT_ID, "Default", &config.path]),
			"AWS::ApiGateway::Resource",
		)
		.property("ParentId", api.get_att("RootResourceId"))
		.property("PathPart", config.path.as_str())
		.property("RestApiId", api.ref_()),
	)?;

	let post_body = json!({
		"HttpMethod": HttpMethod::Post.as_str(),
		"ResourceId": path_resource.ref_(),
		"RestApiId": api.ref_(),
		"AuthorizationType": AuthorizationType::None.as_str(),
		"Integration": {
			"Type": "AWS_PROXY",
			"IntegrationHttpMethod": "POST",
			"Uri": join("", vec![
				json!(format!("arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/", target.region)),
				function.get_att("Arn"),
				json!("/invocations"),
			]),
			"IntegrationResponses": [{ "StatusCode": "200" }],
		},
		"MethodResponses": [{
			"StatusCode": "200",
			"ResponseModels": { "application/json": "Empty" },
		}],
	});
	let post = add_method(builder, &config.path, HttpMethod::Post, &post_body)?;

	let preflight_status = 204;
	let options_body = json!({
		"HttpMethod": HttpMethod::Options.as_str(),
		"ResourceId": path_resource.ref_(),
		"RestApiId": api.ref_(),
		"AuthorizationType": AuthorizationType::None.as_str(),
		"Integration": {
			"Type": "MOCK",
			"RequestTemplates": { "application/json": "{ statusCode: 200 }" },
			"IntegrationResponses": [{
				"StatusCode": preflight_status.to_string(),
				"ResponseParameters": cors.integration_response_parameters(),
			}],
		},
		"MethodResponses": [{
			"StatusCode": preflight_status.to_string(),
			"ResponseParameters": cors.method_response_parameters(),
		}],
	});
	let options = add_method(builder, &config.path, HttpMethod::Options, &options_body)?;

	// Any change to a method must produce a new deployment.
	let mut hasher = Sha256::new();
	hasher.update(post_body.to_string().as_bytes());
	hasher.update(options_body.to_string().as_bytes());
	let content = hex::encode(hasher.finalize());
	let deployment = builder.add(
		Resource::new(
			format!(
				"{}{}",
				logical_id(&[API_CONSTRUCT_ID, "Deployment"]),
				&content[..32]
			),
			"AWS::ApiGateway::Deployment",
		)
		.property("RestApiId", api.ref_())
		.property("Description", "Automatically created by the RestApi construct")
		.depends_on(path_resource.logical_id())
		.depends_on(post.logical_id())
		.depends_on(options.logical_id()),
	)?;

	let stage = builder.add(
		Resource::new(
			logical_id(&[API_CONSTRUCT_ID, "DeploymentStage", &config.stage_name]),
			"AWS::ApiGateway::Stage",
		)
		.property("RestApiId", api.ref_())
		.property("DeploymentId", deployment.ref_())
		.property("StageName", config.stage_name.as_str())
		.property(
			"MethodSettings",
			json!([{
				"HttpMethod": "*",
				"ResourcePath": "/*",
				"ThrottlingRateLimit": config.rate_limit,
				"ThrottlingBurstLimit": config.burst_limit,
				"DataTraceEnabled": false,
			}]),
		)
		.taggable(),
	)?;

	let mut invoke_permissions = Vec::with_capacity(2);
	for (suffix, stage_value) in [
		("", stage.ref_()),
		(".Test", json!(TEST_INVOKE_STAGE)),
	] {
		let id = logical_id(&[
			API_CONSTRUCT_ID,
			"Default",
			&config.path,
			HttpMethod::Post.as_str(),
			&format!("ApiPermission{suffix}"),
		]);
		invoke_permissions.push(
			builder.add(
				Resource::new(id, "AWS::Lambda::Permission")
					.property("Action", "lambda:InvokeFunction")
					.property("FunctionName", function.get_att("Arn"))
					.property("Principal", "apigateway.amazonaws.com")
					.property(
						"SourceArn",
						execute_api_arn(target, &api, stage_value, &config.path),
					),
			)?,
		);
	}

	builder.add_output(Output {
		logical_id: URL_OUTPUT_ID.to_string(),
		value: join(
			"",
			vec![
				json!("https://"),
				api.ref_(),
				json!(format!(".execute-api.{}.", target.region)),
				ref_("AWS::URLSuffix"),
				json!("/"),
				stage.ref_(),
				json!("/"),
			],
		),
		description: URL_OUTPUT_DESCRIPTION.to_string(),
	})?;

	let routes = vec![
		Route {
			method: HttpMethod::Post,
			path: config.path.clone(),
			authorization: AuthorizationType::None,
			integration: Integration::LambdaProxy {
				function: function.clone(),
			},
			cors: None,
			resource: post,
		},
		Route {
			method: HttpMethod::Options,
			path: config.path.clone(),
			authorization: AuthorizationType::None,
			integration: Integration::Mock {
				status: preflight_status,
			},
			cors: Some(cors.clone()),
			resource: options,
		},
	];

	Ok(EdgeEndpoint {
		api,
		path_resource,
		routes,
		deployment,
		stage,
		invoke_permissions,
		url_output: URL_OUTPUT_ID.to_string(),
		stage_name: config.stage_name.clone(),
		path: config.path.clone(),
		rate_limit: config.rate_limit,
		burst_limit: config.burst_limit,
		cors,
	})
}

fn add_method(
	builder: &mut TemplateBuilder,
	path: &str,
	method: HttpMethod,
	body: &Value,
) -> StackResult<ResourceRef> {
	let mut resource = Resource::new(
		logical_id(&[API_CONSTRUCT_ID, "Default", path, method.as_str()]),
		"AWS::ApiGateway::Method",
	);
	if let Value::Object(properties) = body {
		for (key, value) in properties {
			resource = resource.property(key, value.clone());
		}
	}
	builder.add(resource)
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

	fn config() -> EdgeConfig {
		EdgeConfig {
			api_name: "SlackBedrockAPI".to_string(),
			rate_limit: 10.0,
			burst_limit: 20,
			stage_name: "prod".to_string(),
			path: "slack".to_string(),
		}
	}

	fn provisioned() -> (EdgeEndpoint, crate::template::Template) {
		let mut builder = TemplateBuilder::new("t");
		let function = builder
			.add(Resource::new("Handler", "AWS::Lambda::Function"))
			.unwrap();
		let edge = provision(&mut builder, &config(), &function, &target()).unwrap();
		(edge, builder.build(vec![]))
	}

	#[test]
	fn test_slack_cors_headers() {
		let headers = CorsPolicy::slack().response_headers();
		assert_eq!(
			headers[0],
			(
				"Access-Control-Allow-Headers",
				"Content-Type,X-Slack-Signature,X-Slack-Request-Timestamp".to_string()
			)
		);
		assert_eq!(headers[1].1, "*");
		assert_eq!(headers[2].1, "POST");
	}

	#[test]
	fn test_post_route_is_open_proxy() {
		let (edge, template) = provisioned();
		let route = edge.route(HttpMethod::Post).unwrap();
		assert_eq!(route.authorization, AuthorizationType::None);
		let method = template.resource(route.resource.logical_id()).unwrap();
		assert_eq!(method.get("AuthorizationType"), Some(&json!("NONE")));
		assert_eq!(method.get("Integration").unwrap()["Type"], "AWS_PROXY");
		assert_eq!(
			method.get("MethodResponses").unwrap()[0]["ResponseModels"]["application/json"],
			"Empty"
		);
	}

	#[test]
	fn test_options_route_is_mock() {
		let (edge, template) = provisioned();
		let route = edge.route(HttpMethod::Options).unwrap();
		assert_eq!(route.integration, Integration::Mock { status: 204 });
		let method = template.resource(route.resource.logical_id()).unwrap();
		let params = &method.get("Integration").unwrap()["IntegrationResponses"][0]["ResponseParameters"];
		assert_eq!(
			params["method.response.header.Access-Control-Allow-Methods"],
			"'POST'"
		);
		assert_eq!(
			params["method.response.header.Access-Control-Allow-Headers"],
			"'Content-Type,X-Slack-Signature,X-Slack-Request-Timestamp'"
		);
	}

	#[test]
	fn test_stage_throttling() {
		let (edge, template) = provisioned();
		let stage = template.resource(edge.stage.logical_id()).unwrap();
		let settings = &stage.get("MethodSettings").unwrap()[0];
		assert_eq!(settings["ThrottlingRateLimit"], json!(10.0));
		assert_eq!(settings["ThrottlingBurstLimit"], json!(20));
		assert_eq!(stage.get("StageName"), Some(&json!("prod")));
	}

	#[test]
	fn test_deployment_waits_for_methods() {
		let (edge, template) = provisioned();
		let deployment = template.resource(edge.deployment.logical_id()).unwrap();
		for route in &edge.routes {
			assert!(deployment
				.dependencies()
				.contains(route.resource.logical_id()));
		}
	}

	#[test]
	fn test_invoke_permissions() {
		let (edge, template) = provisioned();
		assert_eq!(edge.invoke_permissions.len(), 2);
		let test_stage = template
			.resource(edge.invoke_permissions[1].logical_id())
			.unwrap();
		let arn = test_stage.get("SourceArn").unwrap()["Fn::Join"][1].clone();
		assert_eq!(arn[0], "arn:aws:execute-api:us-east-1:123456789012:");
		assert_eq!(arn[3], "test-invoke-stage");
		assert_eq!(arn[4], "/POST/slack");
	}

	#[test]
	fn test_url_output() {
		let (_, template) = provisioned();
		let output = template.output(URL_OUTPUT_ID).unwrap();
		let parts = &output.value["Fn::Join"][1];
		assert_eq!(parts[0], "https://");
		assert_eq!(parts[2], ".execute-api.us-east-1.");
		assert_eq!(parts[3], json!({ "Ref": "AWS::URLSuffix" }));
	}

	#[test]
	fn test_unresolved_region_fails() {
		let mut builder = TemplateBuilder::new("t");
		let function = builder
			.add(Resource::new("Handler", "AWS::Lambda::Function"))
			.unwrap();
		let mut target = target();
		target.region = "${Token[AWS.Region]}".to_string();
		assert!(provision(&mut builder, &config(), &function, &target).is_err());
	}

	#[test]
	fn test_method_parse() {
		assert_eq!(HttpMethod::parse("options"), Some(HttpMethod::Options));
		assert_eq!(HttpMethod::parse("TRACE"), None);
	}
}
