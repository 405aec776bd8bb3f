// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Log output with credential values scrubbed.
//!
//! Credentials are only known once configuration has loaded, which happens
//! after the subscriber is installed. [`SecretRegistry`] is shared between the
//! writer and the command, so values registered later still get redacted.

use std::io::{self, Write};
use std::sync::{Arc, RwLock};

use clap::ValueEnum;
use kbslack_common_secret::REDACTED;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

/// Credential values to scrub from log output.
#[derive(Debug, Clone, Default)]
pub struct SecretRegistry {
	values: Arc<RwLock<Vec<String>>>,
}

impl SecretRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a value, plus its JSON-escaped form when that differs.
	/// Blank values are ignored; anything else is scrubbed however short.
	pub fn register(&self, value: &str) {
		if value.trim().is_empty() {
			return;
		}
		let mut forms = vec![value.to_string()];
		if let Ok(quoted) = serde_json::to_string(value) {
			let escaped = &quoted[1..quoted.len() - 1];
			if escaped != value {
				forms.push(escaped.to_string());
			}
		}

		let mut values = match self.values.write() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		for form in forms {
			if !values.contains(&form) {
				values.push(form);
			}
		}
		// Longest first so a value containing another is replaced whole.
		values.sort_by_key(|v| std::cmp::Reverse(v.len()));
	}

	pub fn redact(&self, line: &str) -> String {
		let values = match self.values.read() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		let mut out = line.to_string();
		for value in values.iter() {
			if out.contains(value.as_str()) {
				out = out.replace(value.as_str(), REDACTED);
			}
		}
		out
	}

	pub fn len(&self) -> usize {
		self.values.read().map(|v| v.len()).unwrap_or_default()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Buffers until a newline so a value split across writes is still caught.
pub struct RedactingWriter<W: Write> {
	inner: W,
	buffer: Vec<u8>,
	secrets: SecretRegistry,
}

impl<W: Write> RedactingWriter<W> {
	pub fn new(inner: W, secrets: SecretRegistry) -> Self {
		Self {
			inner,
			buffer: Vec::new(),
			secrets,
		}
	}

	fn write_redacted(&mut self, bytes: &[u8]) -> io::Result<()> {
		let text = String::from_utf8_lossy(bytes);
		let redacted = self.secrets.redact(&text);
		self.inner.write_all(redacted.as_bytes())
	}
}

impl<W: Write> Drop for RedactingWriter<W> {
	fn drop(&mut self) {
		let _ = self.flush();
	}
}

impl<W: Write> Write for RedactingWriter<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.buffer.extend_from_slice(buf);

		while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
			let line: Vec<u8> = self.buffer.drain(..=newline).collect();
			self.write_redacted(&line)?;
		}

		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		if !self.buffer.is_empty() {
			let rest = std::mem::take(&mut self.buffer);
			self.write_redacted(&rest)?;
		}
		self.inner.flush()
	}
}

pub struct RedactingMakeWriter<M> {
	inner: M,
	secrets: SecretRegistry,
}

impl<M> RedactingMakeWriter<M> {
	pub fn new(inner: M, secrets: SecretRegistry) -> Self {
		Self { inner, secrets }
	}
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
	M: MakeWriter<'a>,
{
	type Writer = RedactingWriter<M::Writer>;

	fn make_writer(&'a self) -> Self::Writer {
		RedactingWriter::new(self.inner.make_writer(), self.secrets.clone())
	}
}

/// Install the global subscriber. Logs go to stderr; stdout carries command output.
pub fn init(format: LogFormat, secrets: SecretRegistry) -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let writer = RedactingMakeWriter::new(io::stderr, secrets);
	let registry = tracing_subscriber::registry().with(filter);

	match format {
		LogFormat::Text => registry
			.with(tracing_subscriber::fmt::layer().with_writer(writer))
			.try_init()?,
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json().with_writer(writer))
			.try_init()?,
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn registry(values: &[&str]) -> SecretRegistry {
		let registry = SecretRegistry::new();
		for value in values {
			registry.register(value);
		}
		registry
	}

	#[test]
	fn test_single_line() {
		let mut output = Vec::new();
		{
			let mut writer = RedactingWriter::new(Cursor::new(&mut output), registry(&["xoxb-123-abc"]));
			writeln!(writer, "token=xoxb-123-abc").unwrap();
		}
		let result = String::from_utf8(output).unwrap();
		assert_eq!(result, "token=[REDACTED]\n");
	}

	#[test]
	fn test_value_split_across_writes() {
		let mut output = Vec::new();
		{
			let mut writer = RedactingWriter::new(Cursor::new(&mut output), registry(&["xoxb-123-abc"]));
			writer.write_all(b"token=xoxb-12").unwrap();
			writer.write_all(b"3-abc\nnext\n").unwrap();
		}
		let result = String::from_utf8(output).unwrap();
		assert_eq!(result, "token=[REDACTED]\nnext\n");
	}

	#[test]
	fn test_flush_incomplete_line() {
		let mut output = Vec::new();
		{
			let mut writer = RedactingWriter::new(Cursor::new(&mut output), registry(&["signing-secret-value"]));
			writer.write_all(b"no newline signing-secret-value").unwrap();
		}
		let result = String::from_utf8(output).unwrap();
		assert_eq!(result, "no newline [REDACTED]");
	}

	#[test]
	fn test_json_escaped_form() {
		let registry = registry(&["a\"b\\cdef"]);
		assert_eq!(registry.len(), 2);
		assert_eq!(
			registry.redact(r#"{"value":"a\"b\\cdef"}"#),
			r#"{"value":"[REDACTED]"}"#
		);
	}

	#[test]
	fn test_blank_values_ignored() {
		let registry = registry(&["", "  "]);
		assert!(registry.is_empty());
		assert_eq!(registry.redact("a b"), "a b");
	}

	#[test]
	fn test_short_credential_still_redacted() {
		let registry = registry(&["zq"]);
		assert_eq!(registry.len(), 1);
		assert_eq!(registry.redact("secret=zq"), "secret=[REDACTED]");
	}

	#[test]
	fn test_registered_after_writer_created() {
		let secrets = SecretRegistry::new();
		let mut output = Vec::new();
		{
			let mut writer = RedactingWriter::new(Cursor::new(&mut output), secrets.clone());
			secrets.register("late-secret");
			writeln!(writer, "value late-secret").unwrap();
		}
		assert_eq!(String::from_utf8(output).unwrap(), "value [REDACTED]\n");
	}

	#[test]
	fn test_longest_value_wins() {
		let registry = registry(&["secret", "secret-extended"]);
		assert_eq!(registry.redact("secret-extended"), "[REDACTED]");
	}
}
