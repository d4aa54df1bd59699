//! Data types shared across parsing, extraction, aggregation and resolution

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::matching::{action_matches, resource_matches};

/// Policy language version IAM assumes when a document omits `Version`.
pub const DEFAULT_POLICY_VERSION: &str = "2008-10-17";

/// Statement effect. IAM only accepts the exact spellings `Allow` and `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// The entries a statement applies to: either the listed patterns
/// (`Action` / `Resource`) or everything except them (`NotAction` /
/// `NotResource`). The set is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Scope {
    Only(BTreeSet<String>),
    AllExcept(BTreeSet<String>),
}

impl Scope {
    pub fn patterns(&self) -> &BTreeSet<String> {
        match self {
            Scope::Only(patterns) | Scope::AllExcept(patterns) => patterns,
        }
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, Scope::AllExcept(_))
    }

    /// Whether this action scope covers `action`.
    pub fn covers_action(&self, action: &str) -> bool {
        self.covers(|pattern| action_matches(pattern, action))
    }

    /// Whether this resource scope covers the concrete ARN `arn`.
    pub fn covers_resource(&self, arn: &str) -> bool {
        self.covers(|pattern| resource_matches(pattern, arn))
    }

    fn covers(&self, matches: impl Fn(&str) -> bool) -> bool {
        match self {
            Scope::Only(patterns) => patterns.iter().any(|p| matches(p)),
            Scope::AllExcept(patterns) => !patterns.iter().any(|p| matches(p)),
        }
    }
}

/// One Allow/Deny rule of a policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sid: Option<String>,
    pub effect: Effect,
    pub actions: Scope,
    pub resources: Scope,
    /// Kept opaque; conditions cannot be evaluated without request context.
    pub condition: Option<serde_json::Value>,
}

/// A parsed identity policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    pub(crate) version: String,
    pub(crate) statements: Vec<Statement>,
}

impl PolicyDocument {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

/// A concrete IAM role ARN: `arn:<partition>:iam::<account>:role<path><name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleArn {
    pub partition: String,
    pub account_id: String,
    /// IAM path, always starting and ending with `/`.
    pub path: String,
    pub role_name: String,
}

impl RoleArn {
    pub fn to_account_role(&self) -> AccountRoleInfo {
        AccountRoleInfo {
            account_id: self.account_id.clone(),
            role_name: self.role_name.clone(),
        }
    }
}

impl fmt::Display for RoleArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:iam::{}:role{}{}",
            self.partition, self.account_id, self.path, self.role_name
        )
    }
}

/// One switchable (account, role) pair. Field order gives the output ordering:
/// account ID first, then role name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountRoleInfo {
    pub account_id: String,
    pub role_name: String,
}

impl AccountRoleInfo {
    pub fn new(account_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            role_name: role_name.into(),
        }
    }
}

impl fmt::Display for AccountRoleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.account_id, self.role_name)
    }
}

/// Where a policy document came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "Kind", rename_all = "PascalCase")]
pub enum PolicySource {
    #[serde(rename_all = "PascalCase")]
    UserAttached { policy_arn: String },
    #[serde(rename_all = "PascalCase")]
    GroupAttached {
        group_name: String,
        policy_arn: String,
    },
    #[serde(rename_all = "PascalCase")]
    UserInline { policy_name: String },
    #[serde(rename_all = "PascalCase")]
    GroupInline {
        group_name: String,
        policy_name: String,
    },
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicySource::UserAttached { policy_arn } => write!(f, "{policy_arn} (user)"),
            PolicySource::GroupAttached {
                group_name,
                policy_arn,
            } => write!(f, "{policy_arn} (group {group_name})"),
            PolicySource::UserInline { policy_name } => {
                write!(f, "inline policy {policy_name} (user)")
            }
            PolicySource::GroupInline {
                group_name,
                policy_name,
            } => write!(f, "inline policy {policy_name} (group {group_name})"),
        }
    }
}

/// Non-fatal findings produced while extracting grants from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Kind", rename_all = "PascalCase")]
pub enum DiagnosticKind {
    /// Resource pattern with `*`/`?`; accounts cannot be enumerated from it.
    #[serde(rename_all = "PascalCase")]
    UnresolvedWildcard { pattern: String },
    /// `NotResource` grant: every role except the listed patterns.
    #[serde(rename_all = "PascalCase")]
    NegatedResource { excluded: Vec<String> },
    #[serde(rename_all = "PascalCase")]
    MalformedRoleArn { resource: String, reason: String },
    /// Allow carrying a `Condition`; reported, since it may not hold at call time.
    #[serde(rename_all = "PascalCase")]
    ConditionalGrant { resource: String },
    /// Deny carrying a `Condition`; not applied, since it cannot be evaluated here.
    #[serde(rename_all = "PascalCase")]
    ConditionalDeny { resources: Vec<String> },
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::UnresolvedWildcard { pattern } => {
                write!(f, "wildcard resource {pattern} cannot be resolved to concrete roles")
            }
            DiagnosticKind::NegatedResource { excluded } => write!(
                f,
                "NotResource grant allows every role except {}",
                excluded.join(", ")
            ),
            DiagnosticKind::MalformedRoleArn { resource, reason } => {
                write!(f, "skipping resource {resource}: {reason}")
            }
            DiagnosticKind::ConditionalGrant { resource } => {
                write!(f, "grant on {resource} is conditional")
            }
            DiagnosticKind::ConditionalDeny { resources } => write!(
                f,
                "conditional deny on {} was not applied",
                resources.join(", ")
            ),
        }
    }
}

/// A finding tagged with the policy it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Diagnostic {
    pub source: PolicySource,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.kind)
    }
}
