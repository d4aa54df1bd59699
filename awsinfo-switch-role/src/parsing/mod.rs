//! Policy document and ARN parsing (pure Rust)

pub mod arn;
pub mod document;

pub use arn::{parse_role_arn, user_name_from_arn, ArnError};
pub use document::{parse_policy, PolicyParseError};
