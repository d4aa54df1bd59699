//! IAM policy document parsing
//!
//! Documents are deserialized into a loose wire model first, then validated
//! into [`PolicyDocument`]. IAM allows `Statement`, `Action`, `Resource` (and
//! their `Not*` forms) to be either a single value or a list; both forms are
//! normalized here.

use std::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;

use crate::types::{Effect, PolicyDocument, Scope, Statement, DEFAULT_POLICY_VERSION};

#[derive(Error, Debug)]
pub enum PolicyParseError {
    #[error("policy document is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("policy document has no Statement")]
    MissingStatement,
    #[error("statement {index}: missing Effect")]
    MissingEffect { index: usize },
    #[error("statement {index}: invalid Effect '{value}' (expected \"Allow\" or \"Deny\")")]
    InvalidEffect { index: usize, value: String },
    #[error("statement {index}: {message}")]
    InvalidStatement { index: usize, message: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPolicy {
    version: Option<String>,
    statement: Option<OneOrMany<RawStatement>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStatement {
    sid: Option<String>,
    effect: Option<String>,
    action: Option<OneOrMany<String>>,
    not_action: Option<OneOrMany<String>>,
    resource: Option<OneOrMany<String>>,
    not_resource: Option<OneOrMany<String>>,
    condition: Option<serde_json::Value>,
}

/// Parse a raw identity policy document.
///
/// Fails when the input is not JSON, has no `Statement`, or any statement
/// has an unknown `Effect` or lacks its action or resource entries.
pub fn parse_policy(raw: impl AsRef<[u8]>) -> Result<PolicyDocument, PolicyParseError> {
    let raw: RawPolicy = serde_json::from_slice(raw.as_ref())?;
    let statements = raw
        .statement
        .ok_or(PolicyParseError::MissingStatement)?
        .into_vec()
        .into_iter()
        .enumerate()
        .map(|(index, statement)| convert_statement(index, statement))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PolicyDocument {
        version: raw
            .version
            .unwrap_or_else(|| DEFAULT_POLICY_VERSION.to_string()),
        statements,
    })
}

fn convert_statement(index: usize, raw: RawStatement) -> Result<Statement, PolicyParseError> {
    let effect = match raw.effect.as_deref() {
        Some("Allow") => Effect::Allow,
        Some("Deny") => Effect::Deny,
        Some(other) => {
            return Err(PolicyParseError::InvalidEffect {
                index,
                value: other.to_string(),
            })
        }
        None => return Err(PolicyParseError::MissingEffect { index }),
    };

    let actions = scope(index, "Action", raw.action, raw.not_action)?;
    let resources = scope(index, "Resource", raw.resource, raw.not_resource)?;

    Ok(Statement {
        sid: raw.sid,
        effect,
        actions,
        resources,
        condition: raw.condition,
    })
}

/// Build a [`Scope`] from a field and its `Not*` counterpart; exactly one
/// must be present and non-empty.
fn scope(
    index: usize,
    field: &str,
    listed: Option<OneOrMany<String>>,
    excluded: Option<OneOrMany<String>>,
) -> Result<Scope, PolicyParseError> {
    let invalid = |message: String| PolicyParseError::InvalidStatement { index, message };

    let scope = match (listed, excluded) {
        (Some(listed), None) => Scope::Only(to_set(listed)),
        (None, Some(excluded)) => Scope::AllExcept(to_set(excluded)),
        (Some(_), Some(_)) => {
            return Err(invalid(format!("both {field} and Not{field} are present")))
        }
        (None, None) => return Err(invalid(format!("missing {field}"))),
    };

    if scope.patterns().is_empty() {
        let name = if scope.is_negated() {
            format!("Not{field}")
        } else {
            field.to_string()
        };
        return Err(invalid(format!("{name} is empty")));
    }
    Ok(scope)
}

fn to_set(values: OneOrMany<String>) -> BTreeSet<String> {
    values.into_vec().into_iter().collect()
}
