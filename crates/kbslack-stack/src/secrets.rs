// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret store: the bot token and the request-signing secret.
//!
//! Each secret gets a fixed, caller-assigned name so the handler can look it
//! up without a redeploy when only the value rotates. The plaintext never
//! appears in the template: the secret body is a `NoEcho` parameter whose
//! value travels separately in [`ParameterValues`].

use std::collections::BTreeMap;

use kbslack_common_secret::SecretString;
use kbslack_stack_config::CredentialsConfig;
use serde_json::Value;

use crate::error::{StackError, StackResult};
use crate::template::{logical_id, Parameter, Resource, ResourceRef, TemplateBuilder};

pub const BOT_TOKEN_SECRET_NAME: &str = "/slack/bot-token";
pub const SIGNING_SECRET_NAME: &str = "/slack/signing-secret";

const SECRET_TYPE: &str = "AWS::SecretsManager::Secret";

/// Deploy-time values for `NoEcho` parameters, keyed by parameter logical id.
pub type ParameterValues = BTreeMap<String, SecretString>;

/// What one secret looks like before it is declared.
struct SecretDecl {
	construct_id: &'static str,
	name: &'static str,
	description: &'static str,
	payload_key: &'static str,
}

const BOT_TOKEN: SecretDecl = SecretDecl {
	construct_id: "SlackBotTokenSecret",
	name: BOT_TOKEN_SECRET_NAME,
	description: "Slack Bot User OAuth Token",
	payload_key: "token",
};

const SIGNING_SECRET: SecretDecl = SecretDecl {
	construct_id: "SlackBotSigningSecret",
	name: SIGNING_SECRET_NAME,
	description: "Slack Signing Secret",
	payload_key: "secret",
};

/// A declared secret. `Ref` on the resource resolves to its ARN.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedSecret {
	pub name: &'static str,
	pub resource: ResourceRef,
	pub parameter: String,
	pub payload_key: &'static str,
}

impl ProvisionedSecret {
	pub fn arn(&self) -> Value {
		self.resource.ref_()
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecretStore {
	pub bot_token: ProvisionedSecret,
	pub signing_secret: ProvisionedSecret,
}

impl SecretStore {
	/// Exactly the ARNs of the secrets this stack created.
	pub fn arns(&self) -> Vec<Value> {
		vec![self.bot_token.arn(), self.signing_secret.arn()]
	}

	pub fn names(&self) -> [&'static str; 2] {
		[self.bot_token.name, self.signing_secret.name]
	}
}

/// Fail unless both credentials carry a value. Runs before anything is declared.
pub fn require_credentials(credentials: &CredentialsConfig) -> StackResult<()> {
	if credentials.slack_bot_token.is_blank() {
		return Err(StackError::MissingCredential {
			name: "slackBotToken",
		});
	}
	if credentials.slack_signing_secret.is_blank() {
		return Err(StackError::MissingCredential {
			name: "slackSigningSecret",
		});
	}
	Ok(())
}

/// Declare both secrets and record their payloads in `values`.
pub fn provision(
	builder: &mut TemplateBuilder,
	credentials: &CredentialsConfig,
	values: &mut ParameterValues,
) -> StackResult<SecretStore> {
	require_credentials(credentials)?;

	let bot_token = declare(builder, &BOT_TOKEN, &credentials.slack_bot_token, values)?;
	let signing_secret = declare(
		builder,
		&SIGNING_SECRET,
		&credentials.slack_signing_secret,
		values,
	)?;

	Ok(SecretStore {
		bot_token,
		signing_secret,
	})
}

fn declare(
	builder: &mut TemplateBuilder,
	decl: &SecretDecl,
	value: &SecretString,
	values: &mut ParameterValues,
) -> StackResult<ProvisionedSecret> {
	let parameter = logical_id(&[decl.construct_id, "Value"]);
	let mut payload = serde_json::Map::new();
	payload.insert(
		decl.payload_key.to_string(),
		Value::String(value.expose().clone()),
	);
	let payload = serde_json::to_string(&payload).map_err(|source| StackError::Serialize {
		what: "secret payload",
		source,
	})?;

	let value_ref = builder.add_parameter(Parameter {
		logical_id: parameter.clone(),
		description: format!("Payload of {}", decl.name),
		no_echo: true,
	})?;
	values.insert(parameter.clone(), SecretString::new(payload));

	let resource = builder.add(
		Resource::new(logical_id(&[decl.construct_id]), SECRET_TYPE)
			.property("Name", decl.name)
			.property("Description", decl.description)
			.property("SecretString", value_ref)
			.taggable(),
	)?;

	Ok(ProvisionedSecret {
		name: decl.name,
		resource,
		parameter,
		payload_key: decl.payload_key,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn credentials(token: &str, secret: &str) -> CredentialsConfig {
		CredentialsConfig {
			slack_bot_token: SecretString::from(token),
			slack_signing_secret: SecretString::from(secret),
		}
	}

	#[test]
	fn test_fixed_names() {
		let mut builder = TemplateBuilder::new("t");
		let mut values = ParameterValues::new();
		let store = provision(&mut builder, &credentials("xoxb-test", "shh"), &mut values).unwrap();
		assert_eq!(store.names(), ["/slack/bot-token", "/slack/signing-secret"]);
	}

	#[test]
	fn test_payload_only_in_parameter_values() {
		let mut builder = TemplateBuilder::new("t");
		let mut values = ParameterValues::new();
		let store = provision(&mut builder, &credentials("xoxb-test", "shh"), &mut values).unwrap();

		let rendered = builder.build(vec![]).to_string_pretty().unwrap();
		assert!(!rendered.contains("xoxb-test"));
		assert!(!rendered.contains("\"shh\""));

		assert_eq!(
			values[&store.bot_token.parameter].expose(),
			r#"{"token":"xoxb-test"}"#
		);
		assert_eq!(
			values[&store.signing_secret.parameter].expose(),
			r#"{"secret":"shh"}"#
		);
	}

	#[test]
	fn test_payload_is_escaped() {
		let mut builder = TemplateBuilder::new("t");
		let mut values = ParameterValues::new();
		let store =
			provision(&mut builder, &credentials("a\"b\\c", "shh"), &mut values).unwrap();
		let payload: serde_json::Value =
			serde_json::from_str(values[&store.bot_token.parameter].expose()).unwrap();
		assert_eq!(payload["token"], "a\"b\\c");
	}

	#[test]
	fn test_blank_credential_declares_nothing() {
		let mut builder = TemplateBuilder::new("t");
		let mut values = ParameterValues::new();
		let err = provision(&mut builder, &credentials("xoxb-test", ""), &mut values).unwrap_err();
		assert!(matches!(
			err,
			StackError::MissingCredential {
				name: "slackSigningSecret"
			}
		));
		assert!(values.is_empty());
		assert!(builder.build(vec![]).resources().is_empty());
	}

	#[test]
	fn test_secret_arn_is_ref() {
		let mut builder = TemplateBuilder::new("t");
		let mut values = ParameterValues::new();
		let store = provision(&mut builder, &credentials("xoxb-test", "shh"), &mut values).unwrap();
		let arns = store.arns();
		assert_eq!(arns.len(), 2);
		assert_eq!(arns[0]["Ref"], store.bot_token.resource.logical_id());
	}
}
