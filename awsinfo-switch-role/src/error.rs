//! Error types for switch-role resolution

use std::time::Duration;

use thiserror::Error;

use crate::aws::DirectoryError;
use crate::parsing::PolicyParseError;
use crate::types::PolicySource;

/// Why a single policy could not be resolved.
#[derive(Error, Debug)]
pub enum PolicyFailure {
    #[error("malformed policy document: {0}")]
    Malformed(#[from] PolicyParseError),
    #[error("{operation} still throttled after {attempts} attempts")]
    Throttled {
        operation: &'static str,
        attempts: u32,
    },
    #[error(transparent)]
    Fetch(DirectoryError),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("IAM user '{0}' was not found")]
    UserNotFound(String),
    #[error("access denied calling {operation}: {message}")]
    AccessDenied {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} still throttled after {attempts} attempts")]
    Throttling {
        operation: &'static str,
        attempts: u32,
    },
    #[error("could not resolve {policy}: {reason}")]
    PartialFailure {
        policy: PolicySource,
        #[source]
        reason: PolicyFailure,
    },
    #[error("caller '{0}' is not an IAM user; pass a user name explicitly")]
    NotAnIamUser(String),
    #[error("resolution was cancelled")]
    Cancelled,
    #[error("resolution did not finish within {0:?}")]
    DeadlineExceeded(Duration),
    #[error(transparent)]
    Directory(DirectoryError),
}

impl ResolveError {
    pub(crate) fn partial(policy: &PolicySource, reason: PolicyFailure) -> Self {
        Self::PartialFailure {
            policy: policy.clone(),
            reason,
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
