// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Slack request signature verification.
//!
//! The edge endpoint forwards every request without authorization, so the
//! handler behind it must establish authenticity itself. Slack signs each
//! request with HMAC-SHA256 over `v0:<timestamp>:<body>` keyed by the app's
//! signing secret and sends the result as `X-Slack-Signature: v0=<hex>`
//! alongside `X-Slack-Request-Timestamp`.

use hmac::{Hmac, Mac};
use kbslack_common_secret::SecretString;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Header carrying the unix timestamp the signature was computed at.
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Version prefix of the signature scheme.
pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum accepted distance between the request timestamp and now.
pub const MAX_TIMESTAMP_SKEW_SECS: i64 = 60 * 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
	#[error("missing header: {0}")]
	MissingHeader(&'static str),

	#[error("malformed timestamp: {0}")]
	MalformedTimestamp(String),

	#[error("request timestamp is {skew_secs}s away from now")]
	StaleTimestamp { skew_secs: u64 },

	#[error("signature does not match")]
	SignatureMismatch,
}

/// Compute the `v0=<hex>` signature Slack would send for this request.
pub fn compute_signature(secret: &[u8], timestamp: &str, body: &[u8]) -> String {
	let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
	mac.update(base_string_prefix(timestamp).as_bytes());
	mac.update(body);
	format!("{SIGNATURE_VERSION}={}", hex::encode(mac.finalize().into_bytes()))
}

fn base_string_prefix(timestamp: &str) -> String {
	format!("{SIGNATURE_VERSION}:{timestamp}:")
}

/// Verifies inbound requests against a signing secret.
#[derive(Debug, Clone)]
pub struct SlackVerifier {
	signing_secret: SecretString,
	max_skew_secs: i64,
}

impl SlackVerifier {
	pub fn new(signing_secret: SecretString) -> Self {
		Self {
			signing_secret,
			max_skew_secs: MAX_TIMESTAMP_SKEW_SECS,
		}
	}

	pub fn with_max_skew(mut self, secs: i64) -> Self {
		self.max_skew_secs = secs;
		self
	}

	/// Verify a request given its headers, raw body, and the current unix time.
	///
	/// Header names are matched case-insensitively.
	pub fn verify<'a, I>(&self, headers: I, body: &[u8], now_unix: i64) -> Result<(), VerifyError>
	where
		I: IntoIterator<Item = (&'a str, &'a str)> + Clone,
	{
		let timestamp = header(headers.clone(), TIMESTAMP_HEADER)
			.ok_or(VerifyError::MissingHeader(TIMESTAMP_HEADER))?;
		let signature =
			header(headers, SIGNATURE_HEADER).ok_or(VerifyError::MissingHeader(SIGNATURE_HEADER))?;

		let sent_at: i64 = timestamp
			.trim()
			.parse()
			.map_err(|_| VerifyError::MalformedTimestamp(timestamp.to_string()))?;
		// The header is attacker-controlled; the distance must not overflow.
		let skew_secs = now_unix.abs_diff(sent_at);
		let max_skew_secs = u64::try_from(self.max_skew_secs).unwrap_or(0);
		if skew_secs > max_skew_secs {
			return Err(VerifyError::StaleTimestamp { skew_secs });
		}

		let Some(hex_sig) = signature.strip_prefix("v0=") else {
			return Err(VerifyError::SignatureMismatch);
		};
		let expected = hex::decode(hex_sig).map_err(|_| VerifyError::SignatureMismatch)?;

		let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose().as_bytes())
			.map_err(|_| VerifyError::SignatureMismatch)?;
		mac.update(base_string_prefix(timestamp.trim()).as_bytes());
		mac.update(body);
		mac
			.verify_slice(&expected)
			.map_err(|_| VerifyError::SignatureMismatch)
	}
}

fn header<'a, I>(headers: I, name: &str) -> Option<&'a str>
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	headers
		.into_iter()
		.find(|(k, _)| k.eq_ignore_ascii_case(name))
		.map(|(_, v)| v)
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn prop_signed_requests_verify(
			secret in "[a-f0-9]{8,40}",
			body in proptest::collection::vec(proptest::num::u8::ANY, 0..512),
			offset in -300i64..=300
		) {
			let now = 1_700_000_000i64;
			let ts = (now + offset).to_string();
			let sig = compute_signature(secret.as_bytes(), &ts, &body);
			let verifier = SlackVerifier::new(SecretString::from(secret));
			let headers = [(TIMESTAMP_HEADER, ts.as_str()), (SIGNATURE_HEADER, sig.as_str())];
			prop_assert!(verifier.verify(headers, &body, now).is_ok());
		}

		#[test]
		fn prop_any_timestamp_is_handled(sent_at in any::<i64>(), now in any::<i64>()) {
			let ts = sent_at.to_string();
			let verifier = SlackVerifier::new(SecretString::from("shh"));
			let headers = [(TIMESTAMP_HEADER, ts.as_str()), (SIGNATURE_HEADER, "v0=00")];
			let result = verifier.verify(headers, b"body", now);
			if now.abs_diff(sent_at) > 300 {
				prop_assert_eq!(
					result,
					Err(VerifyError::StaleTimestamp { skew_secs: now.abs_diff(sent_at) })
				);
			} else {
				prop_assert_eq!(result, Err(VerifyError::SignatureMismatch));
			}
		}

		#[test]
		fn prop_tampered_body_fails(
			body in proptest::collection::vec(proptest::num::u8::ANY, 1..256)
		) {
			let now = 1_700_000_000i64;
			let ts = now.to_string();
			let sig = compute_signature(b"shh", &ts, &body);
			let mut tampered = body.clone();
			tampered[0] ^= 0xff;
			let verifier = SlackVerifier::new(SecretString::from("shh"));
			let headers = [(TIMESTAMP_HEADER, ts.as_str()), (SIGNATURE_HEADER, sig.as_str())];
			prop_assert_eq!(
				verifier.verify(headers, &tampered, now),
				Err(VerifyError::SignatureMismatch)
			);
		}
	}
}
