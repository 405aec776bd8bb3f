// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `kbslack` command line: synthesize, validate and inspect the stack.
//!
//! Nothing here talks to the cloud. `synth` writes a cloud assembly that
//! deploy tooling picks up.

pub mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kbslack_stack::{cloud_assembly, synthesize_with, HandlerContract, SynthOptions, SynthesizedStack};
use kbslack_stack_config::{load_config_with, parse_context_pairs, EnvSource, LoadOptions, StackConfig};
use tracing::{info, warn};

use crate::logging::{LogFormat, SecretRegistry};

#[derive(Parser, Debug)]
#[command(
	name = "kbslack",
	about = "Synthesize the Slack knowledge-base integration stack",
	version
)]
pub struct Args {
	/// TOML config file (defaults to ./kbslack.toml when present)
	#[arg(long, global = true, env = "KBSLACK_CONFIG")]
	pub config: Option<PathBuf>,

	/// Deploy context value, e.g. `-c slackBotToken=xoxb-...`
	#[arg(short = 'c', long = "context", value_name = "KEY=VALUE", global = true)]
	pub context: Vec<String>,

	/// Directory the function code path is resolved against
	#[arg(long, global = true, default_value = ".")]
	pub app_dir: PathBuf,

	#[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "KBSLACK_LOG_FORMAT")]
	pub log_format: LogFormat,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// Write the cloud assembly
	Synth {
		/// Output directory
		#[arg(short, long, default_value = "cdk.out")]
		out: PathBuf,

		/// Also write the secret parameter values (mode 0600) to this file
		#[arg(long, value_name = "FILE")]
		parameters_out: Option<PathBuf>,
	},
	/// Load configuration, assemble and audit without writing anything
	Validate,
	/// Print the handler's permission statements
	Policy,
}

/// Load config from `env` plus the command line, registering credentials
/// for redaction before anything else can log them.
pub fn load(args: &Args, env: EnvSource, secrets: &SecretRegistry) -> Result<StackConfig> {
	let context = parse_context_pairs(&args.context).context("invalid --context value")?;
	let config = load_config_with(LoadOptions {
		config_file: args.config.clone(),
		context,
		env,
	})
	.context("failed to load configuration")?;

	secrets.register(config.credentials.slack_bot_token.expose());
	secrets.register(config.credentials.slack_signing_secret.expose());
	Ok(config)
}

pub fn run(args: Args, env: EnvSource, secrets: &SecretRegistry) -> Result<()> {
	let config = load(&args, env, secrets)?;
	let stack = synthesize_with(
		&config,
		&SynthOptions {
			base_dir: args.app_dir.clone(),
		},
	)
	.context("stack synthesis failed")?;

	match args.command {
		Command::Synth {
			out,
			parameters_out,
		} => synth(&stack, &out, parameters_out),
		Command::Validate => {
			println!("{}", summary(&stack));
			Ok(())
		}
		Command::Policy => {
			let document = serde_json::to_string_pretty(&stack.boundary.to_policy_document())
				.context("failed to render policy")?;
			println!("{document}");
			Ok(())
		}
	}
}

fn synth(stack: &SynthesizedStack, out: &Path, parameters_out: Option<PathBuf>) -> Result<()> {
	let assembly = cloud_assembly::write(stack, out)
		.with_context(|| format!("failed to write cloud assembly to {}", out.display()))?;

	match parameters_out {
		Some(path) => {
			cloud_assembly::write_parameter_values(stack, &path)
				.with_context(|| format!("failed to write parameter values to {}", path.display()))?;
		}
		None => warn!(
			parameters = stack.parameter_values.len(),
			"secret parameter values not written; pass --parameters-out to deploy"
		),
	}

	info!(manifest = %assembly.manifest.display(), "synth complete");
	println!("{}", assembly.template.display());
	Ok(())
}

/// Human-readable description of a synthesized stack.
pub fn summary(stack: &SynthesizedStack) -> String {
	let contract = HandlerContract::from_stack(stack);
	let purposes: Vec<String> = contract.purposes.iter().map(|p| p.to_string()).collect();
	let mut lines = vec![
		format!("stack:                  {}", stack.name),
		format!("target:                 {}", stack.target.environment_uri()),
		format!("resources:              {}", stack.template.resources().len()),
		format!("termination protection: {}", stack.termination_protection),
		format!("secrets:                {}", stack.secrets.names().join(", ")),
		format!("permission purposes:    {}", purposes.join(", ")),
		format!(
			"edge:                   POST/OPTIONS /{} (auth {}), {} rps burst {}",
			stack.edge.path,
			contract.edge_authorization.as_str(),
			stack.edge.rate_limit,
			stack.edge.burst_limit
		),
		format!("url output:             {}", stack.edge.url_output),
	];
	if let Some(signature) = &contract.signature {
		lines.push(format!(
			"handler must verify:    {} over {}:<timestamp>:<body>, max skew {}s",
			signature.signature_header, signature.version, signature.max_skew_secs
		));
	}
	lines.join("\n")
}
