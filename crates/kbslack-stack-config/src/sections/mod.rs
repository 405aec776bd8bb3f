// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each section has a partial `*Layer` used for
//! merging sources and a resolved runtime type.

mod credentials;
mod edge;
mod environment;
mod function;
mod identity;
mod permissions;
mod tags;
mod target;

pub use credentials::{CredentialsConfig, CredentialsConfigLayer};
pub use edge::{EdgeConfig, EdgeConfigLayer};
pub use environment::{
	EnvironmentConfig, EnvironmentConfigLayer, DEFAULT_ENVIRONMENT, PRODUCTION_ENVIRONMENT,
};
pub use function::{Architecture, FunctionConfig, FunctionConfigLayer};
pub use identity::{IdentityConfig, IdentityConfigLayer};
pub use permissions::{PermissionsConfig, PermissionsConfigLayer, SelfInvokeScope};
pub use tags::{TagsConfig, TagsConfigLayer};
pub use target::{is_valid_account, is_valid_region, TargetConfig, TargetConfigLayer};
