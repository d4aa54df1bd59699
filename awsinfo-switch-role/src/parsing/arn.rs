//! ARN helpers for role and user ARNs

use thiserror::Error;

use crate::types::RoleArn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArnError {
    #[error("not an ARN")]
    NotAnArn,
    #[error("expected an IAM ARN, found service '{0}'")]
    NotIam(String),
    #[error("invalid account id '{0}'")]
    InvalidAccount(String),
    #[error("resource '{0}' is not a role")]
    NotARole(String),
    #[error("role name is empty")]
    EmptyRoleName,
}

fn is_account_id(value: &str) -> bool {
    value.len() == 12 && value.chars().all(|c| c.is_ascii_digit())
}

/// Parse `arn:<partition>:iam::<account>:role/[<path>/]<name>`.
pub fn parse_role_arn(arn: &str) -> Result<RoleArn, ArnError> {
    let mut parts = arn.splitn(6, ':');
    let (Some("arn"), Some(partition), Some(service), Some(_region), Some(account), Some(resource)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(ArnError::NotAnArn);
    };

    if partition.is_empty() {
        return Err(ArnError::NotAnArn);
    }
    if service != "iam" {
        return Err(ArnError::NotIam(service.to_string()));
    }
    if !is_account_id(account) {
        return Err(ArnError::InvalidAccount(account.to_string()));
    }
    let Some(rest) = resource.strip_prefix("role/") else {
        return Err(ArnError::NotARole(resource.to_string()));
    };

    let (path, role_name) = match rest.rfind('/') {
        Some(idx) => (format!("/{}", &rest[..=idx]), &rest[idx + 1..]),
        None => ("/".to_string(), rest),
    };
    if role_name.is_empty() {
        return Err(ArnError::EmptyRoleName);
    }

    Ok(RoleArn {
        partition: partition.to_string(),
        account_id: account.to_string(),
        path,
        role_name: role_name.to_string(),
    })
}

/// User name of an IAM user ARN (`arn:aws:iam::<account>:user/[<path>/]<name>`).
///
/// Returns `None` for any other principal type, e.g. an assumed-role session.
pub fn user_name_from_arn(arn: &str) -> Option<String> {
    let resource = arn.splitn(6, ':').nth(5)?;
    let rest = resource.strip_prefix("user/")?;
    let name = rest.rsplit('/').next()?;
    (!name.is_empty()).then(|| name.to_string())
}
