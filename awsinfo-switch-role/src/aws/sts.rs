//! STS helpers for caller identity

use aws_sdk_sts::Client as StsClient;

use crate::aws::{classify, DirectoryError, DirectoryResult};

/// Return the ARN of the current caller using STS GetCallerIdentity.
///
/// # Arguments
///
/// * `client` - STS client to use for the API call
pub(crate) async fn caller_arn(client: &StsClient) -> DirectoryResult<String> {
    let out = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| classify("GetCallerIdentity", e))?;
    out.arn()
        .map(std::string::ToString::to_string)
        .ok_or_else(|| DirectoryError::invalid_response("GetCallerIdentity", "missing Arn"))
}
