//! Extraction of `sts:AssumeRole` grants from a single policy document
//!
//! Allow statements yield concrete [`RoleArn`]s; Deny statements yield the
//! resource scopes they deny. Denies are not applied here: explicit deny is a
//! cross-policy rule and is evaluated by the aggregator once every policy of
//! the principal is known.

use std::collections::BTreeSet;

use log::debug;

use crate::matching::has_wildcard;
use crate::parsing::parse_role_arn;
use crate::types::{DiagnosticKind, Effect, PolicyDocument, RoleArn, Scope, Statement};

/// The action that grants switch-role.
pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";

/// Grants found in one policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleGrants {
    pub allow: BTreeSet<RoleArn>,
    pub deny: BTreeSet<Scope>,
    pub diagnostics: Vec<DiagnosticKind>,
}

impl RoleGrants {
    fn note(&mut self, kind: DiagnosticKind) {
        if !self.diagnostics.contains(&kind) {
            self.diagnostics.push(kind);
        }
    }
}

/// Collect the roles a document allows the principal to assume.
///
/// Never fails: wildcard and unparseable resources become diagnostics.
pub fn extract_assumable_roles(doc: &PolicyDocument) -> RoleGrants {
    let mut grants = RoleGrants::default();

    for statement in doc.statements() {
        if !statement.actions.covers_action(ASSUME_ROLE_ACTION) {
            continue;
        }
        match statement.effect {
            Effect::Allow => collect_allow(statement, &mut grants),
            Effect::Deny => collect_deny(statement, &mut grants),
        }
    }

    debug!(
        "Extracted {} allowed role(s), {} deny scope(s), {} diagnostic(s)",
        grants.allow.len(),
        grants.deny.len(),
        grants.diagnostics.len()
    );
    grants
}

fn collect_allow(statement: &Statement, grants: &mut RoleGrants) {
    let resources = match &statement.resources {
        Scope::Only(resources) => resources,
        Scope::AllExcept(excluded) => {
            grants.note(DiagnosticKind::NegatedResource {
                excluded: excluded.iter().cloned().collect(),
            });
            return;
        }
    };

    for resource in resources {
        if has_wildcard(resource) {
            grants.note(DiagnosticKind::UnresolvedWildcard {
                pattern: resource.clone(),
            });
            continue;
        }
        match parse_role_arn(resource) {
            Ok(role) => {
                if statement.condition.is_some() {
                    grants.note(DiagnosticKind::ConditionalGrant {
                        resource: resource.clone(),
                    });
                }
                grants.allow.insert(role);
            }
            Err(e) => grants.note(DiagnosticKind::MalformedRoleArn {
                resource: resource.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

fn collect_deny(statement: &Statement, grants: &mut RoleGrants) {
    if statement.condition.is_some() {
        grants.note(DiagnosticKind::ConditionalDeny {
            resources: statement.resources.patterns().iter().cloned().collect(),
        });
        return;
    }
    grants.deny.insert(statement.resources.clone());
}
