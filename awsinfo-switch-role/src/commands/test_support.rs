//! In-memory [`IdentityDirectory`] for resolver tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::aws::{DirectoryError, DirectoryResult, IdentityDirectory};

#[derive(Debug, Default, Clone)]
struct Principal {
    groups: Vec<String>,
    attached: Vec<String>,
    inline: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeDirectory {
    caller: String,
    users: HashMap<String, Principal>,
    groups: HashMap<String, Principal>,
    managed: HashMap<String, String>,
    throttles: Mutex<HashMap<&'static str, u32>>,
    denied: HashSet<&'static str>,
    calls: Mutex<Vec<&'static str>>,
    latency: Duration,
    slow: HashMap<&'static str, Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeDirectory {
    pub(crate) fn with_caller(mut self, arn: &str) -> Self {
        self.caller = arn.to_string();
        self
    }

    pub(crate) fn with_user(mut self, user: &str) -> Self {
        self.users.entry(user.to_string()).or_default();
        self
    }

    pub(crate) fn user_in_group(mut self, user: &str, group: &str) -> Self {
        self.users
            .entry(user.to_string())
            .or_default()
            .groups
            .push(group.to_string());
        self.groups.entry(group.to_string()).or_default();
        self
    }

    pub(crate) fn attach_user_policy(mut self, user: &str, arn: &str, document: &str) -> Self {
        self.users
            .entry(user.to_string())
            .or_default()
            .attached
            .push(arn.to_string());
        self.managed.insert(arn.to_string(), document.to_string());
        self
    }

    pub(crate) fn attach_group_policy(mut self, group: &str, arn: &str, document: &str) -> Self {
        self.groups
            .entry(group.to_string())
            .or_default()
            .attached
            .push(arn.to_string());
        self.managed.insert(arn.to_string(), document.to_string());
        self
    }

    pub(crate) fn put_user_inline_policy(mut self, user: &str, name: &str, document: &str) -> Self {
        self.users
            .entry(user.to_string())
            .or_default()
            .inline
            .push((name.to_string(), document.to_string()));
        self
    }

    pub(crate) fn put_group_inline_policy(
        mut self,
        group: &str,
        name: &str,
        document: &str,
    ) -> Self {
        self.groups
            .entry(group.to_string())
            .or_default()
            .inline
            .push((name.to_string(), document.to_string()));
        self
    }

    /// Fail the next `times` calls to `operation` with a throttling error.
    pub(crate) fn throttle(self, operation: &'static str, times: u32) -> Self {
        self.throttles.lock().unwrap().insert(operation, times);
        self
    }

    pub(crate) fn deny(mut self, operation: &'static str) -> Self {
        self.denied.insert(operation);
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay only calls to `operation`, overriding [`Self::with_latency`].
    pub(crate) fn with_latency_on(mut self, operation: &'static str, latency: Duration) -> Self {
        self.slow.insert(operation, latency);
        self
    }

    pub(crate) fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: &'static str) -> DirectoryResult<InFlight<'_>> {
        self.calls.lock().unwrap().push(operation);
        if self.denied.contains(operation) {
            return Err(DirectoryError::AccessDenied {
                operation,
                message: "not authorized".into(),
            });
        }
        {
            let mut throttles = self.throttles.lock().unwrap();
            if let Some(remaining) = throttles.get_mut(operation) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DirectoryError::Throttled {
                        operation,
                        message: "Rate exceeded".into(),
                    });
                }
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        let latency = self.slow.get(operation).copied().unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(guard)
    }

    fn user(&self, operation: &'static str, user: &str) -> DirectoryResult<&Principal> {
        self.users.get(user).ok_or_else(|| DirectoryError::NotFound {
            operation,
            message: format!("The user with name {user} cannot be found."),
        })
    }

    fn group(&self, operation: &'static str, group: &str) -> DirectoryResult<&Principal> {
        self.groups.get(group).ok_or_else(|| DirectoryError::NotFound {
            operation,
            message: format!("The group with name {group} cannot be found."),
        })
    }
}

fn inline_document(
    operation: &'static str,
    principal: &Principal,
    name: &str,
) -> DirectoryResult<String> {
    principal
        .inline
        .iter()
        .find(|(policy_name, _)| policy_name == name)
        .map(|(_, document)| document.clone())
        .ok_or_else(|| DirectoryError::NotFound {
            operation,
            message: format!("inline policy {name} not found"),
        })
}

#[async_trait]
impl IdentityDirectory for FakeDirectory {
    async fn caller_identity(&self) -> DirectoryResult<String> {
        let _guard = self.enter("GetCallerIdentity").await?;
        Ok(self.caller.clone())
    }

    async fn list_groups_for_user(&self, user_name: &str) -> DirectoryResult<Vec<String>> {
        let op = "ListGroupsForUser";
        let _guard = self.enter(op).await?;
        Ok(self.user(op, user_name)?.groups.clone())
    }

    async fn list_attached_user_policies(&self, user_name: &str) -> DirectoryResult<Vec<String>> {
        let op = "ListAttachedUserPolicies";
        let _guard = self.enter(op).await?;
        Ok(self.user(op, user_name)?.attached.clone())
    }

    async fn list_attached_group_policies(
        &self,
        group_name: &str,
    ) -> DirectoryResult<Vec<String>> {
        let op = "ListAttachedGroupPolicies";
        let _guard = self.enter(op).await?;
        Ok(self.group(op, group_name)?.attached.clone())
    }

    async fn list_user_inline_policies(&self, user_name: &str) -> DirectoryResult<Vec<String>> {
        let op = "ListUserPolicies";
        let _guard = self.enter(op).await?;
        let user = self.user(op, user_name)?;
        Ok(user.inline.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn list_group_inline_policies(&self, group_name: &str) -> DirectoryResult<Vec<String>> {
        let op = "ListGroupPolicies";
        let _guard = self.enter(op).await?;
        let group = self.group(op, group_name)?;
        Ok(group.inline.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn get_policy_default_version_document(
        &self,
        policy_arn: &str,
    ) -> DirectoryResult<String> {
        let op = "GetPolicyVersion";
        let _guard = self.enter(op).await?;
        self.managed
            .get(policy_arn)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                operation: op,
                message: format!("Policy {policy_arn} was not found."),
            })
    }

    async fn get_user_inline_policy_document(
        &self,
        user_name: &str,
        policy_name: &str,
    ) -> DirectoryResult<String> {
        let op = "GetUserPolicy";
        let _guard = self.enter(op).await?;
        inline_document(op, self.user(op, user_name)?, policy_name)
    }

    async fn get_group_inline_policy_document(
        &self,
        group_name: &str,
        policy_name: &str,
    ) -> DirectoryResult<String> {
        let op = "GetGroupPolicy";
        let _guard = self.enter(op).await?;
        inline_document(op, self.group(op, group_name)?, policy_name)
    }
}
