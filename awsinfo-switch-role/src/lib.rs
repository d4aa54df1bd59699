//! This crate provides the core logic for discovering which IAM roles a user
//! can switch into:
//! - IAM policy document and ARN parsing
//! - `sts:AssumeRole` grant extraction and cross-policy deny
//! - Resolution against IAM with retries and bounded concurrency
//!

pub mod aggregation;
mod aws;
pub mod commands;
mod error;
pub mod extraction;
pub mod matching;
pub mod parsing;
mod types;

// Re-exports for a small, focused public API
pub use aggregation::{merge, Aggregation, DeniedRole, PolicyGrants};
pub use aws::{AwsIamDirectory, DirectoryError, DirectoryResult, IdentityDirectory};
pub use commands::{
    AwsConfigOptions, Resolution, ResolutionState, Resolver, ResolverConfig, RetryPolicy,
    SwitchRoleService, DEFAULT_MAX_CONCURRENCY,
};
pub use error::{PolicyFailure, ResolveError, ResolveResult};
pub use extraction::{extract_assumable_roles, RoleGrants, ASSUME_ROLE_ACTION};
pub use parsing::{
    parse_policy, parse_role_arn, user_name_from_arn, ArnError, PolicyParseError,
};
pub use types::{
    AccountRoleInfo, Diagnostic, DiagnosticKind, Effect, PolicyDocument, PolicySource, RoleArn,
    Scope, Statement, DEFAULT_POLICY_VERSION,
};
