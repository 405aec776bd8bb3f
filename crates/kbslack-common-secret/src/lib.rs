// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret wrapper that prevents accidental disclosure of credential values.
//!
//! A [`Secret<T>`] never prints its contents through `Debug` or `Display`,
//! serializes as [`REDACTED`], and zeroizes its memory on drop. The only way
//! to read the value is the explicit [`Secret::expose`] call, which makes
//! every disclosure point greppable.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder printed in place of any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never appear in logs, templates, or outputs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T: Zeroize> {
	inner: T,
}

/// The common case: a secret string such as a bot token.
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the secret value.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl SecretString {
	/// True when the wrapped string is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl<T: Zeroize> Drop for Secret<T> {
	fn drop(&mut self) {
		self.inner.zeroize();
	}
}

impl<T: Zeroize> ZeroizeOnDrop for Secret<T> {}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

#[cfg(feature = "serde")]
impl<T: Zeroize> serde::Serialize for Secret<T> {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for Secret<T>
where
	T: Zeroize + serde::Deserialize<'de>,
{
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		T::deserialize(deserializer).map(Secret::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_debug_is_redacted() {
		let secret = SecretString::from("xoxb-test");
		assert_eq!(format!("{secret:?}"), REDACTED);
	}

	#[test]
	fn test_display_is_redacted() {
		let secret = SecretString::from("shh");
		assert_eq!(format!("{secret}"), REDACTED);
	}

	#[test]
	fn test_expose_returns_value() {
		let secret = SecretString::from("xoxb-test");
		assert_eq!(secret.expose(), "xoxb-test");
	}

	#[test]
	fn test_is_blank() {
		assert!(SecretString::from("").is_blank());
		assert!(SecretString::from("  \t").is_blank());
		assert!(!SecretString::from("x").is_blank());
	}

	#[test]
	fn test_serialize_is_redacted() {
		let secret = SecretString::from("xoxb-test");
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, format!("\"{REDACTED}\""));
	}

	#[test]
	fn test_deserialize_wraps_value() {
		let secret: SecretString = serde_json::from_str("\"shh\"").unwrap();
		assert_eq!(secret.expose(), "shh");
	}

	#[derive(Debug)]
	#[allow(dead_code)]
	struct Holder {
		token: SecretString,
	}

	#[test]
	fn test_nested_debug_is_redacted() {
		let holder = Holder {
			token: SecretString::from("xoxb-123"),
		};
		let printed = format!("{holder:?}");
		assert!(!printed.contains("xoxb-123"));
		assert!(printed.contains(REDACTED));
	}
}

#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn prop_never_formats_value(value in "[a-zA-Z0-9]{12,40}") {
			let secret = SecretString::from(value.clone());
			let debug = format!("{secret:?}");
			let display = format!("{secret}");
			prop_assert!(!debug.contains(&value));
			prop_assert!(!display.contains(&value));
			prop_assert_eq!(secret.expose(), &value);
		}
	}
}
