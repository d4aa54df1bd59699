//! Commands module - resolution pipeline and service layer

pub(crate) mod resolve;
pub(crate) mod retry;
pub(crate) mod service;
pub(crate) mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use resolve::{Resolution, Resolver, ResolverConfig, DEFAULT_MAX_CONCURRENCY};
pub use retry::RetryPolicy;
pub use service::{AwsConfigOptions, SwitchRoleService};
pub use state::ResolutionState;
