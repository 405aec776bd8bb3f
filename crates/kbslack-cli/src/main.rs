// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Slack knowledge-base stack synthesizer binary.

use clap::Parser;
use kbslack_cli::logging::{self, SecretRegistry};
use kbslack_cli::Args;
use kbslack_stack_config::EnvSource;

fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let secrets = SecretRegistry::new();
	logging::init(args.log_format, secrets.clone())?;

	kbslack_cli::run(args, EnvSource::process(), &secrets)
}
