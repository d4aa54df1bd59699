//! `awsinfo`: list the AWS accounts and roles an IAM user can switch into.

mod output;

use std::num::{NonZeroU32, NonZeroUsize};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use awsinfo_switch_role::{AwsConfigOptions, ResolverConfig, RetryPolicy, SwitchRoleService};
use clap::{Parser, ValueEnum};
use log::debug;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `<accountId> <roleName>` per line
    #[default]
    Text,
    Json,
}

/// List the AWS accounts and roles an IAM user can switch into
///
/// Reads the user's and their groups' identity policies and reports every
/// role granted through `sts:AssumeRole` that no policy denies.
#[derive(Parser, Debug)]
#[command(name = "awsinfo", version, about, long_about)]
struct Cli {
    /// IAM user name (defaults to the caller's own identity)
    #[arg(value_name = "USER", env = "AWSINFO_USER")]
    user: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t, env = "AWSINFO_FORMAT")]
    format: OutputFormat,

    /// Append the policy that grants each role
    #[arg(long, env = "AWSINFO_SHOW_SOURCE")]
    show_source: bool,

    /// Maximum number of concurrent IAM calls
    #[arg(long, default_value = "8", env = "AWSINFO_CONCURRENCY")]
    concurrency: NonZeroUsize,

    /// Attempts per IAM call when throttled, including the first
    #[arg(long, default_value = "5", env = "AWSINFO_MAX_ATTEMPTS")]
    max_attempts: NonZeroU32,

    /// Give up after this many seconds
    #[arg(long, env = "AWSINFO_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// AWS profile to use
    #[arg(long, env = "AWSINFO_PROFILE")]
    profile: Option<String>,

    /// AWS region to use
    #[arg(long, env = "AWSINFO_REGION")]
    region: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "AWSINFO_DEBUG")]
    debug: bool,
}

impl Cli {
    fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_concurrency: self.concurrency.get(),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.get(),
                ..RetryPolicy::default()
            },
            deadline: self.timeout_secs.map(Duration::from_secs),
        }
    }

    fn aws_options(&self) -> AwsConfigOptions {
        AwsConfigOptions {
            profile: self.profile.clone(),
            region: self.region.clone(),
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let service = SwitchRoleService::new(&cli.aws_options(), cli.resolver_config()).await;

    let user_name = match &cli.user {
        Some(user) => user.clone(),
        None => service
            .current_user_name(&cancel)
            .await
            .context("Failed to determine the current IAM user")?,
    };
    output::note(&format!("user name: {user_name}"));

    let resolution = service
        .resolve(&user_name, &cancel)
        .await
        .with_context(|| format!("Failed to resolve switchable roles for {user_name}"))?;
    debug!(
        "Evaluated {} policies across {} group(s)",
        resolution.policies_evaluated,
        resolution.groups.len()
    );

    output::print_findings(&resolution);
    match cli.format {
        OutputFormat::Text => output::print_text(&resolution, cli.show_source),
        OutputFormat::Json => output::print_json(&resolution),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(cli, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
