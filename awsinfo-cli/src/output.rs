use std::io::{self, Write};

use anyhow::{Context, Result};
use awsinfo_switch_role::{AccountRoleInfo, DeniedRole, Diagnostic, PolicySource, Resolution};
use serde::Serialize;

pub(crate) fn note(msg: &str) {
    let _ = writeln!(io::stderr(), "awsinfo: {msg}");
}

pub(crate) fn warn(msg: &str) {
    let _ = writeln!(io::stderr(), "awsinfo (warning): {msg}");
}

pub(crate) fn error(msg: &str) {
    let _ = writeln!(io::stderr(), "awsinfo (error): {msg}");
}

/// One line per role; the granting policy is appended when `show_source` is set.
pub(crate) fn print_text(resolution: &Resolution, show_source: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut w = stdout.lock();
    if resolution.roles.is_empty() {
        writeln!(
            w,
            "No switchable accounts and roles were found for {}.",
            resolution.user_name
        )
        .context("Failed to write output")?;
        return Ok(());
    }

    for role in &resolution.roles {
        match resolution.granted_by.get(role).filter(|_| show_source) {
            Some(source) => writeln!(w, "{role}\t{source}"),
            None => writeln!(w, "{role}"),
        }
        .context("Failed to write output")?;
    }
    Ok(())
}

pub(crate) fn print_json(resolution: &Resolution) -> Result<()> {
    let report = JsonReport::from(resolution);
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize roles")?;
    writeln!(io::stdout(), "{json}").context("Failed to write output")?;
    Ok(())
}

/// Diagnostics and denied roles, written to stderr.
pub(crate) fn print_findings(resolution: &Resolution) {
    for diagnostic in &resolution.diagnostics {
        warn(&diagnostic.to_string());
    }
    for denied in &resolution.denied {
        note(&format!(
            "{} allowed by {} but denied by {}",
            denied.role, denied.allowed_by, denied.denied_by
        ));
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct JsonReport<'a> {
    user_name: &'a str,
    groups: &'a [String],
    roles: Vec<JsonRole<'a>>,
    denied: &'a [DeniedRole],
    diagnostics: &'a [Diagnostic],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct JsonRole<'a> {
    #[serde(flatten)]
    role: &'a AccountRoleInfo,
    granted_by: Option<&'a PolicySource>,
}

impl<'a> From<&'a Resolution> for JsonReport<'a> {
    fn from(resolution: &'a Resolution) -> Self {
        Self {
            user_name: &resolution.user_name,
            groups: &resolution.groups,
            roles: resolution
                .roles
                .iter()
                .map(|role| JsonRole {
                    role,
                    granted_by: resolution.granted_by.get(role),
                })
                .collect(),
            denied: &resolution.denied,
            diagnostics: &resolution.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_report_shape() {
        let role = AccountRoleInfo::new("123456789012", "ReadOnlySwitchRole");
        let source = PolicySource::UserAttached {
            policy_arn: "arn:aws:iam::123456789012:policy/P1".into(),
        };
        let resolution = Resolution {
            user_name: "alice".into(),
            groups: vec!["devs".into()],
            roles: vec![role.clone()],
            granted_by: BTreeMap::from([(role, source)]),
            denied: vec![],
            diagnostics: vec![],
            policies_evaluated: 1,
        };

        let value = serde_json::to_value(JsonReport::from(&resolution)).unwrap();
        assert_eq!(value["UserName"], "alice");
        assert_eq!(value["Roles"][0]["AccountId"], "123456789012");
        assert_eq!(value["Roles"][0]["RoleName"], "ReadOnlySwitchRole");
        assert_eq!(
            value["Roles"][0]["GrantedBy"]["PolicyArn"],
            "arn:aws:iam::123456789012:policy/P1"
        );
    }
}
