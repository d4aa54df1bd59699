//! Resolution of switchable roles for one IAM user
//!
//! Groups are listed first; the user's and every group's policies are then
//! listed and fetched with bounded fan-out. Fetch results land in per-task
//! slots (an ordered stream) and are parsed, extracted and merged
//! sequentially once every fetch has completed.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::retry::{with_backoff, RetryError, RetryPolicy};
use super::state::{ResolutionState, StateMachine};
use crate::aggregation::{merge, DeniedRole, PolicyGrants};
use crate::aws::{DirectoryError, IdentityDirectory};
use crate::error::{PolicyFailure, ResolveError, ResolveResult};
use crate::extraction::extract_assumable_roles;
use crate::parsing::{parse_policy, user_name_from_arn};
use crate::types::{AccountRoleInfo, Diagnostic, PolicySource};

/// Default number of in-flight directory calls.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Upper bound for a whole `resolve` call.
    pub deadline: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub user_name: String,
    pub groups: Vec<String>,
    /// Sorted by account ID, then role name.
    pub roles: Vec<AccountRoleInfo>,
    /// Lowest-ordered policy whose grant for each role survived deny.
    pub granted_by: BTreeMap<AccountRoleInfo, PolicySource>,
    pub denied: Vec<DeniedRole>,
    pub diagnostics: Vec<Diagnostic>,
    pub policies_evaluated: usize,
}

#[derive(Debug, Clone, Copy)]
enum ListingTask<'a> {
    UserAttached,
    UserInline,
    GroupAttached(&'a str),
    GroupInline(&'a str),
}

pub struct Resolver<D> {
    directory: D,
    config: ResolverConfig,
}

impl<D: IdentityDirectory> Resolver<D> {
    pub fn new(directory: D, config: ResolverConfig) -> Self {
        Self { directory, config }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// User name of the calling IAM user.
    pub async fn current_user_name(&self, cancel: &CancellationToken) -> ResolveResult<String> {
        let arn = with_backoff(&self.config.retry, cancel, || {
            self.directory.caller_identity()
        })
        .await
        .map_err(|e| listing_error(e, None))?;
        debug!("Caller identity: {arn}");
        user_name_from_arn(&arn).ok_or(ResolveError::NotAnIamUser(arn))
    }

    /// Resolve the roles `user_name` can switch into.
    ///
    /// Fails on the first permanent error; throttled calls are retried per
    /// [`RetryPolicy`]. Cancelling `cancel` (or hitting the configured
    /// deadline) drops every in-flight call and returns immediately.
    pub async fn resolve(
        &self,
        user_name: &str,
        cancel: &CancellationToken,
    ) -> ResolveResult<Resolution> {
        let mut machine = StateMachine::new(user_name);
        let outcome = match self.config.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.run(user_name, cancel, &mut machine))
                .await
                .unwrap_or(Err(ResolveError::DeadlineExceeded(deadline))),
            None => self.run(user_name, cancel, &mut machine).await,
        };

        match &outcome {
            Ok(resolution) => {
                machine.advance(ResolutionState::Done);
                info!(
                    "Resolved {} role(s) for {user_name} from {} policies",
                    resolution.roles.len(),
                    resolution.policies_evaluated
                );
            }
            Err(e) => machine.fail(e),
        }
        debug!("Resolution for {user_name} ended in {:?}", machine.state());
        outcome
    }

    async fn run(
        &self,
        user_name: &str,
        cancel: &CancellationToken,
        machine: &mut StateMachine,
    ) -> ResolveResult<Resolution> {
        machine.advance(ResolutionState::FetchingGroups);
        let groups = with_backoff(&self.config.retry, cancel, || {
            self.directory.list_groups_for_user(user_name)
        })
        .await
        .map_err(|e| listing_error(e, Some(user_name)))?;
        debug!("{user_name} is a member of {} group(s): {groups:?}", groups.len());

        machine.advance(ResolutionState::FetchingPolicies);
        let sources = self.list_policy_sources(user_name, &groups, cancel).await?;
        debug!("{user_name} has {} policies to evaluate", sources.len());
        let documents: Vec<String> = stream::iter(&sources)
            .map(|source| self.fetch_document(user_name, source, cancel))
            .buffered(self.concurrency())
            .try_collect()
            .await?;

        machine.advance(ResolutionState::ExtractingRoles);
        let policies_evaluated = sources.len();
        let mut grants = Vec::with_capacity(policies_evaluated);
        let mut diagnostics = Vec::new();
        for (source, document) in sources.into_iter().zip(documents) {
            let doc = parse_policy(&document)
                .map_err(|e| ResolveError::partial(&source, PolicyFailure::Malformed(e)))?;
            let extracted = extract_assumable_roles(&doc);
            diagnostics.extend(extracted.diagnostics.into_iter().map(|kind| Diagnostic {
                source: source.clone(),
                kind,
            }));
            grants.push(PolicyGrants {
                source,
                allow: extracted.allow,
                deny: extracted.deny,
            });
        }

        let aggregation = merge(&grants);
        Ok(Resolution {
            user_name: user_name.to_string(),
            groups,
            roles: aggregation.roles,
            granted_by: aggregation.granted_by,
            denied: aggregation.denied,
            diagnostics,
            policies_evaluated,
        })
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrency.max(1)
    }

    async fn list_policy_sources(
        &self,
        user_name: &str,
        groups: &[String],
        cancel: &CancellationToken,
    ) -> ResolveResult<Vec<PolicySource>> {
        let mut tasks = vec![ListingTask::UserAttached, ListingTask::UserInline];
        tasks.extend(groups.iter().flat_map(|group| {
            [
                ListingTask::GroupAttached(group.as_str()),
                ListingTask::GroupInline(group.as_str()),
            ]
        }));

        let listed: Vec<Vec<PolicySource>> = stream::iter(tasks)
            .map(|task| self.list_sources(user_name, task, cancel))
            .buffered(self.concurrency())
            .try_collect()
            .await?;
        Ok(listed.into_iter().flatten().collect())
    }

    async fn list_sources(
        &self,
        user_name: &str,
        task: ListingTask<'_>,
        cancel: &CancellationToken,
    ) -> ResolveResult<Vec<PolicySource>> {
        let retry = &self.config.retry;
        let directory = &self.directory;
        let sources = match task {
            ListingTask::UserAttached => {
                with_backoff(retry, cancel, || directory.list_attached_user_policies(user_name))
                    .await
                    .map_err(|e| listing_error(e, Some(user_name)))?
                    .into_iter()
                    .map(|policy_arn| PolicySource::UserAttached { policy_arn })
                    .collect()
            }
            ListingTask::UserInline => {
                with_backoff(retry, cancel, || directory.list_user_inline_policies(user_name))
                    .await
                    .map_err(|e| listing_error(e, Some(user_name)))?
                    .into_iter()
                    .map(|policy_name| PolicySource::UserInline { policy_name })
                    .collect()
            }
            ListingTask::GroupAttached(group) => {
                with_backoff(retry, cancel, || directory.list_attached_group_policies(group))
                    .await
                    .map_err(|e| listing_error(e, None))?
                    .into_iter()
                    .map(|policy_arn| PolicySource::GroupAttached {
                        group_name: group.to_string(),
                        policy_arn,
                    })
                    .collect()
            }
            ListingTask::GroupInline(group) => {
                with_backoff(retry, cancel, || directory.list_group_inline_policies(group))
                    .await
                    .map_err(|e| listing_error(e, None))?
                    .into_iter()
                    .map(|policy_name| PolicySource::GroupInline {
                        group_name: group.to_string(),
                        policy_name,
                    })
                    .collect()
            }
        };
        Ok(sources)
    }

    async fn fetch_document(
        &self,
        user_name: &str,
        source: &PolicySource,
        cancel: &CancellationToken,
    ) -> ResolveResult<String> {
        let retry = &self.config.retry;
        let directory = &self.directory;
        let fetched = match source {
            PolicySource::UserAttached { policy_arn }
            | PolicySource::GroupAttached { policy_arn, .. } => {
                with_backoff(retry, cancel, || {
                    directory.get_policy_default_version_document(policy_arn)
                })
                .await
            }
            PolicySource::UserInline { policy_name } => {
                with_backoff(retry, cancel, || {
                    directory.get_user_inline_policy_document(user_name, policy_name)
                })
                .await
            }
            PolicySource::GroupInline {
                group_name,
                policy_name,
            } => {
                with_backoff(retry, cancel, || {
                    directory.get_group_inline_policy_document(group_name, policy_name)
                })
                .await
            }
        };

        fetched.map_err(|e| match e {
            RetryError::Cancelled => ResolveError::Cancelled,
            RetryError::Exhausted {
                operation,
                attempts,
            } => ResolveError::partial(source, PolicyFailure::Throttled { operation, attempts }),
            RetryError::Permanent(DirectoryError::AccessDenied { operation, message }) => {
                ResolveError::AccessDenied { operation, message }
            }
            RetryError::Permanent(other) => ResolveError::partial(source, PolicyFailure::Fetch(other)),
        })
    }
}

/// Map a failed listing call; `user_name` is set for user-scoped calls so a
/// missing entity is reported as an unknown user.
fn listing_error(err: RetryError, user_name: Option<&str>) -> ResolveError {
    match err {
        RetryError::Cancelled => ResolveError::Cancelled,
        RetryError::Exhausted {
            operation,
            attempts,
        } => ResolveError::Throttling {
            operation,
            attempts,
        },
        RetryError::Permanent(DirectoryError::NotFound { operation, message }) => match user_name {
            Some(user) => ResolveError::UserNotFound(user.to_string()),
            None => ResolveError::Directory(DirectoryError::NotFound { operation, message }),
        },
        RetryError::Permanent(DirectoryError::AccessDenied { operation, message }) => {
            ResolveError::AccessDenied { operation, message }
        }
        RetryError::Permanent(other) => ResolveError::Directory(other),
    }
}
