//! AWS SDK integration: the identity directory seam and its IAM/STS implementation.

pub(crate) mod iam_client;
pub(crate) mod sts;

use async_trait::async_trait;
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

pub use iam_client::AwsIamDirectory;

#[derive(Error, Debug, Clone)]
pub enum DirectoryError {
    #[error("{operation}: no such entity: {message}")]
    NotFound {
        operation: &'static str,
        message: String,
    },
    #[error("{operation}: access denied: {message}")]
    AccessDenied {
        operation: &'static str,
        message: String,
    },
    #[error("{operation}: request throttled: {message}")]
    Throttled {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
    #[error("{operation}: unexpected response: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl DirectoryError {
    /// Only throttling is worth retrying at this layer; the SDK already
    /// retries transport failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::NotFound { operation, .. }
            | Self::AccessDenied { operation, .. }
            | Self::Throttled { operation, .. }
            | Self::Service { operation, .. }
            | Self::InvalidResponse { operation, .. } => operation,
        }
    }

    pub(crate) fn invalid_response(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            operation,
            message: message.into(),
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottled",
    "RequestThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "UnrecognizedClientException",
    "InvalidClientTokenId",
    "ExpiredToken",
];

/// Map an SDK error onto the directory error classes by its AWS error code.
pub(crate) fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> DirectoryError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_owned);
    let message = DisplayErrorContext(&err).to_string();
    classify_code(operation, code.as_deref(), message)
}

fn classify_code(operation: &'static str, code: Option<&str>, message: String) -> DirectoryError {
    match code {
        Some("NoSuchEntity") => DirectoryError::NotFound { operation, message },
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => {
            DirectoryError::AccessDenied { operation, message }
        }
        Some(code) if THROTTLING_CODES.contains(&code) => {
            DirectoryError::Throttled { operation, message }
        }
        _ => DirectoryError::Service { operation, message },
    }
}

/// Read access to IAM identities and their policies.
///
/// Implementations are expected to be slow, rate limited and fallible; the
/// resolver layers retries and bounded concurrency on top. Listing methods
/// return complete (fully paginated) results. Document methods return the
/// decoded JSON text.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// ARN of the principal whose credentials are in use.
    async fn caller_identity(&self) -> DirectoryResult<String>;

    async fn list_groups_for_user(&self, user_name: &str) -> DirectoryResult<Vec<String>>;

    /// Managed policy ARNs attached to the user.
    async fn list_attached_user_policies(&self, user_name: &str) -> DirectoryResult<Vec<String>>;

    /// Managed policy ARNs attached to the group.
    async fn list_attached_group_policies(&self, group_name: &str)
        -> DirectoryResult<Vec<String>>;

    /// Inline policy names embedded in the user.
    async fn list_user_inline_policies(&self, user_name: &str) -> DirectoryResult<Vec<String>>;

    /// Inline policy names embedded in the group.
    async fn list_group_inline_policies(&self, group_name: &str) -> DirectoryResult<Vec<String>>;

    async fn get_policy_default_version_document(&self, policy_arn: &str)
        -> DirectoryResult<String>;

    async fn get_user_inline_policy_document(
        &self,
        user_name: &str,
        policy_name: &str,
    ) -> DirectoryResult<String>;

    async fn get_group_inline_policy_document(
        &self,
        group_name: &str,
        policy_name: &str,
    ) -> DirectoryResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_codes() {
        let op = "ListGroupsForUser";
        assert!(matches!(
            classify_code(op, Some("NoSuchEntity"), "gone".into()),
            DirectoryError::NotFound { .. }
        ));
        assert!(matches!(
            classify_code(op, Some("AccessDenied"), "no".into()),
            DirectoryError::AccessDenied { .. }
        ));
        assert!(classify_code(op, Some("Throttling"), "slow down".into()).is_transient());
        assert!(classify_code(op, Some("ThrottlingException"), "slow down".into()).is_transient());
        assert!(!classify_code(op, Some("ServiceFailure"), "boom".into()).is_transient());
        assert!(matches!(
            classify_code(op, None, "dispatch failure".into()),
            DirectoryError::Service { .. }
        ));
    }

    #[test]
    fn test_error_display_names_operation() {
        let err = classify_code("GetPolicy", Some("AccessDenied"), "not allowed".into());
        assert_eq!(err.operation(), "GetPolicy");
        assert_eq!(err.to_string(), "GetPolicy: access denied: not allowed");
    }
}
