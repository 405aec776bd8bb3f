// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Declarative stack for the Slack knowledge-base integration.
//!
//! A webhook edge endpoint forwards signed chat-platform requests to a
//! handler function. The function reads two credentials from the secret
//! store and may query the knowledge-base service. This crate declares all
//! of it as one resource graph:
//!
//! - [`secrets`]: the bot token and signing secret, with fixed names
//! - [`compute`]: the handler function, its role and its code asset
//! - [`permissions`]: four purpose-scoped statements on the role
//! - [`edge`]: the REST API, throttled stage and CORS preflight
//! - [`assembly`]: validation and dependency-ordered composition
//! - [`cloud_assembly`]: the files deploy tooling consumes
//!
//! # Usage
//!
//! ```ignore
//! use kbslack_stack::{cloud_assembly, synthesize};
//! use kbslack_stack_config::load_config;
//!
//! let config = load_config()?;
//! let stack = synthesize(&config)?;
//! cloud_assembly::write(&stack, "cdk.out".as_ref())?;
//! ```

pub mod admission;
pub mod assembly;
pub mod cloud_assembly;
pub mod compute;
pub mod contract;
pub mod edge;
pub mod error;
pub mod permissions;
pub mod secrets;
pub mod template;

pub use admission::{EdgeModel, EdgeOutcome, EdgeRequest, EdgeResponse, TokenBucket};
pub use assembly::{stack_tags, synthesize, synthesize_with, SynthOptions, SynthesizedStack};
pub use contract::{HandlerContract, SignatureRequirement};
pub use edge::{AuthorizationType, CorsPolicy, EdgeEndpoint, HttpMethod};
pub use error::{StackError, StackResult};
pub use permissions::{PermissionBoundary, PolicyStatement, PolicyViolation, Purpose};
pub use secrets::{ParameterValues, SecretStore};
pub use template::{Resource, ResourceRef, Tag, Template};
