//! Switch-role service layer
//!
//! Holds the AWS-backed resolver and exposes the operations used by the CLI.

use aws_config::{BehaviorVersion, Region};
use tokio_util::sync::CancellationToken;

use super::resolve::{Resolution, Resolver, ResolverConfig};
use crate::aws::AwsIamDirectory;
use crate::error::ResolveResult;

/// Where to load AWS credentials and region from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsConfigOptions {
    /// Named profile from the shared config files.
    pub profile: Option<String>,
    pub region: Option<String>,
}

/// Main service struct that holds the IAM-backed resolver
pub struct SwitchRoleService {
    resolver: Resolver<AwsIamDirectory>,
}

impl SwitchRoleService {
    /// Create a new service instance with AWS clients
    ///
    /// The configuration is loaded using the default credential provider
    /// chain, narrowed by `options`.
    pub async fn new(options: &AwsConfigOptions, config: ResolverConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &options.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        Self {
            resolver: Resolver::new(AwsIamDirectory::from_config(&sdk_config), config),
        }
    }

    /// User name of the IAM user whose credentials are in use.
    pub async fn current_user_name(&self, cancel: &CancellationToken) -> ResolveResult<String> {
        self.resolver.current_user_name(cancel).await
    }

    pub async fn resolve(
        &self,
        user_name: &str,
        cancel: &CancellationToken,
    ) -> ResolveResult<Resolution> {
        self.resolver.resolve(user_name, cancel).await
    }
}
