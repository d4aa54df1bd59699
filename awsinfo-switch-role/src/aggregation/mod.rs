//! Cross-policy merge of role grants for one principal
//!
//! A role is switchable when at least one policy allows it and no policy of
//! the same principal denies it. Results are keyed by `(account, role name)`
//! and returned sorted, so the output does not depend on fetch order.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Serialize;

use crate::types::{AccountRoleInfo, PolicySource, RoleArn, Scope};

/// Grants contributed by one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyGrants {
    pub source: PolicySource,
    pub allow: BTreeSet<RoleArn>,
    pub deny: BTreeSet<Scope>,
}

/// A role removed by an explicit deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeniedRole {
    pub role: AccountRoleInfo,
    pub allowed_by: PolicySource,
    pub denied_by: PolicySource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Sorted by account ID, then role name.
    pub roles: Vec<AccountRoleInfo>,
    /// Lowest-ordered policy whose grant for the role survived deny.
    pub granted_by: BTreeMap<AccountRoleInfo, PolicySource>,
    pub denied: Vec<DeniedRole>,
}

/// Merge per-policy grants into the final, deny-filtered role list.
///
/// Each `(account, role name)` key is decided from every ARN allowed for it:
/// the key is granted iff at least one of those ARNs is matched by no deny.
/// Role paths collapse onto the same key, so `role/ops/Admin` denied and
/// `role/Admin` allowed still grants `Admin`. The result is independent of
/// the order of `sources`.
pub fn merge<'a>(sources: impl IntoIterator<Item = &'a PolicyGrants>) -> Aggregation {
    let sources: Vec<&PolicyGrants> = sources.into_iter().collect();

    let deny_rules: Vec<(&Scope, &PolicySource)> = sources
        .iter()
        .flat_map(|grants| grants.deny.iter().map(move |scope| (scope, &grants.source)))
        .collect();

    let mut candidates: BTreeMap<AccountRoleInfo, Vec<(&PolicySource, &RoleArn)>> =
        BTreeMap::new();
    for grants in &sources {
        for arn in &grants.allow {
            candidates
                .entry(arn.to_account_role())
                .or_default()
                .push((&grants.source, arn));
        }
    }

    let mut granted_by: BTreeMap<AccountRoleInfo, PolicySource> = BTreeMap::new();
    let mut denied = Vec::new();
    for (key, mut allowed) in candidates {
        allowed.sort();
        allowed.dedup();
        let verdicts: Vec<(&PolicySource, &RoleArn, Option<&PolicySource>)> = allowed
            .into_iter()
            .map(|(source, arn)| (source, arn, denying_source(&deny_rules, &arn.to_string())))
            .collect();

        if let Some((source, _, _)) = verdicts.iter().find(|(_, _, denial)| denial.is_none()) {
            granted_by.insert(key, (*source).clone());
        } else if let Some((allowed_by, arn, Some(denied_by))) = verdicts.first() {
            debug!("{arn} allowed by {allowed_by} but denied by {denied_by}");
            denied.push(DeniedRole {
                role: key,
                allowed_by: (*allowed_by).clone(),
                denied_by: (*denied_by).clone(),
            });
        }
    }

    Aggregation {
        roles: granted_by.keys().cloned().collect(),
        granted_by,
        denied,
    }
}

/// Lowest-ordered source whose deny covers `arn`.
fn denying_source<'a>(deny_rules: &[(&Scope, &'a PolicySource)], arn: &str) -> Option<&'a PolicySource> {
    deny_rules
        .iter()
        .filter(|(scope, _)| scope.covers_resource(arn))
        .map(|(_, source)| *source)
        .min()
}
