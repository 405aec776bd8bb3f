// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! What the stack promises the handler, and what the handler owes back.
//!
//! The edge admits unauthenticated requests, so the handler must verify the
//! platform signature before acting on anything. [`HandlerContract::check`]
//! is that verification, wired to the same header names and skew window the
//! stack advertises.

use kbslack_common_secret::SecretString;
use kbslack_common_webhook::{
	SlackVerifier, VerifyError, MAX_TIMESTAMP_SKEW_SECS, SIGNATURE_HEADER, SIGNATURE_VERSION,
	TIMESTAMP_HEADER,
};

use crate::admission::EdgeRequest;
use crate::assembly::SynthesizedStack;
use crate::edge::{AuthorizationType, HttpMethod};
use crate::permissions::Purpose;

/// How a request proves it came from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRequirement {
	pub signature_header: &'static str,
	pub timestamp_header: &'static str,
	/// Signed base string is `<version>:<timestamp>:<body>`.
	pub version: &'static str,
	pub max_skew_secs: i64,
}

impl Default for SignatureRequirement {
	fn default() -> Self {
		Self {
			signature_header: SIGNATURE_HEADER,
			timestamp_header: TIMESTAMP_HEADER,
			version: SIGNATURE_VERSION,
			max_skew_secs: MAX_TIMESTAMP_SKEW_SECS,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerContract {
	pub bot_token_secret: &'static str,
	pub signing_secret: &'static str,
	pub environment: Vec<(String, String)>,
	pub purposes: Vec<Purpose>,
	pub edge_authorization: AuthorizationType,
	/// `None` only if the edge authenticates on its own.
	pub signature: Option<SignatureRequirement>,
	pub timeout_secs: u32,
}

impl HandlerContract {
	pub fn from_stack(stack: &SynthesizedStack) -> Self {
		let edge_authorization = stack
			.edge
			.route(HttpMethod::Post)
			.map(|r| r.authorization)
			.unwrap_or(AuthorizationType::None);
		let signature = match edge_authorization {
			AuthorizationType::None => Some(SignatureRequirement::default()),
		};

		Self {
			bot_token_secret: stack.secrets.bot_token.name,
			signing_secret: stack.secrets.signing_secret.name,
			environment: stack.compute.environment.clone(),
			purposes: stack.boundary.purposes(),
			edge_authorization,
			signature,
			timeout_secs: stack.compute.timeout_secs,
		}
	}

	pub fn env(&self, name: &str) -> Option<&str> {
		self.environment
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v.as_str())
	}

	pub fn grants(&self, purpose: Purpose) -> bool {
		self.purposes.contains(&purpose)
	}

	/// Verifier the handler is expected to run on every forwarded request.
	pub fn verifier(&self, signing_secret: SecretString) -> Option<SlackVerifier> {
		self.signature
			.as_ref()
			.map(|req| SlackVerifier::new(signing_secret).with_max_skew(req.max_skew_secs))
	}

	/// Accept or reject a request the edge forwarded.
	pub fn check(
		&self,
		request: &EdgeRequest,
		signing_secret: SecretString,
		now_unix: i64,
	) -> Result<(), VerifyError> {
		match self.verifier(signing_secret) {
			Some(verifier) => verifier.verify(request.header_pairs(), &request.body, now_unix),
			None => Ok(()),
		}
	}
}
