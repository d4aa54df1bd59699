//! AWS IAM client wrapper for read-only policy lookups
//!
//! Every listing call is driven through the SDK paginator so that truncated
//! responses (`IsTruncated` / `Marker`) are followed to completion.

use async_trait::async_trait;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::Client as StsClient;
use log::debug;

use crate::aws::sts::caller_arn;
use crate::aws::{classify, DirectoryError, DirectoryResult, IdentityDirectory};

/// [`IdentityDirectory`] backed by the IAM and STS APIs.
#[derive(Debug, Clone)]
pub struct AwsIamDirectory {
    iam: IamClient,
    sts: StsClient,
}

impl AwsIamDirectory {
    pub fn new(iam: IamClient, sts: StsClient) -> Self {
        Self { iam, sts }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(IamClient::new(config), StsClient::new(config))
    }
}

#[async_trait]
impl IdentityDirectory for AwsIamDirectory {
    async fn caller_identity(&self) -> DirectoryResult<String> {
        caller_arn(&self.sts).await
    }

    async fn list_groups_for_user(&self, user_name: &str) -> DirectoryResult<Vec<String>> {
        let groups = self
            .iam
            .list_groups_for_user()
            .user_name(user_name)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("ListGroupsForUser", e))?;
        Ok(groups.into_iter().map(|g| g.group_name).collect())
    }

    async fn list_attached_user_policies(&self, user_name: &str) -> DirectoryResult<Vec<String>> {
        let policies = self
            .iam
            .list_attached_user_policies()
            .user_name(user_name)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("ListAttachedUserPolicies", e))?;
        Ok(policies.into_iter().filter_map(|p| p.policy_arn).collect())
    }

    async fn list_attached_group_policies(
        &self,
        group_name: &str,
    ) -> DirectoryResult<Vec<String>> {
        let policies = self
            .iam
            .list_attached_group_policies()
            .group_name(group_name)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("ListAttachedGroupPolicies", e))?;
        Ok(policies.into_iter().filter_map(|p| p.policy_arn).collect())
    }

    async fn list_user_inline_policies(&self, user_name: &str) -> DirectoryResult<Vec<String>> {
        self.iam
            .list_user_policies()
            .user_name(user_name)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("ListUserPolicies", e))
    }

    async fn list_group_inline_policies(&self, group_name: &str) -> DirectoryResult<Vec<String>> {
        self.iam
            .list_group_policies()
            .group_name(group_name)
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await
            .map_err(|e| classify("ListGroupPolicies", e))
    }

    async fn get_policy_default_version_document(
        &self,
        policy_arn: &str,
    ) -> DirectoryResult<String> {
        let policy = self
            .iam
            .get_policy()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify("GetPolicy", e))?;
        let version_id = policy
            .policy()
            .and_then(|p| p.default_version_id())
            .ok_or_else(|| {
                DirectoryError::invalid_response("GetPolicy", "policy has no default version")
            })?;
        debug!("Fetching {policy_arn} version {version_id}");

        let version = self
            .iam
            .get_policy_version()
            .policy_arn(policy_arn)
            .version_id(version_id)
            .send()
            .await
            .map_err(|e| classify("GetPolicyVersion", e))?;
        let document = version
            .policy_version()
            .and_then(|v| v.document())
            .ok_or_else(|| {
                DirectoryError::invalid_response("GetPolicyVersion", "policy version has no document")
            })?;

        decode_policy_document("GetPolicyVersion", document)
    }

    async fn get_user_inline_policy_document(
        &self,
        user_name: &str,
        policy_name: &str,
    ) -> DirectoryResult<String> {
        let response = self
            .iam
            .get_user_policy()
            .user_name(user_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| classify("GetUserPolicy", e))?;
        decode_policy_document("GetUserPolicy", &response.policy_document)
    }

    async fn get_group_inline_policy_document(
        &self,
        group_name: &str,
        policy_name: &str,
    ) -> DirectoryResult<String> {
        let response = self
            .iam
            .get_group_policy()
            .group_name(group_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| classify("GetGroupPolicy", e))?;
        decode_policy_document("GetGroupPolicy", &response.policy_document)
    }
}

/// URL decode the policy document (AWS returns URL-encoded JSON)
fn decode_policy_document(operation: &'static str, document: &str) -> DirectoryResult<String> {
    percent_encoding::percent_decode_str(document)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| {
            DirectoryError::invalid_response(
                operation,
                format!("Failed to URL decode policy document: {e}"),
            )
        })
}
