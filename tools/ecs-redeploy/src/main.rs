/*!
# Introduction

`ecs-redeploy` rolls a new container image out to a running Amazon ECS service.

It reads the task definition the service currently runs, copies it with a new image, a new
environment and the database credential secrets, registers the copy as a new revision, and
updates the service to use that revision.

The environment given with `--env-vars` replaces the container's environment; nothing is
merged. The container's secrets are replaced by exactly two entries, `DB_USERNAME` and
`DB_PASSWORD`, pointing at the given secret ARNs.

By default the first container of the task definition is updated and any other containers are
left out of the new revision. Pass `--container-name` to update one container by name and keep
the rest.

Nothing is rolled back. If the service update fails, the new revision stays registered.

# Execution roles

`--target-env production` selects the production task execution role. Any other label selects
the development role, with a warning unless it is `development` or `dev`. The built-in roles can
be overridden with a TOML file given to `--roles-config`:

```toml
[execution-roles]
production = "arn:aws:iam::111122223333:role/prod-exec"
development = "arn:aws:iam::111122223333:role/dev-exec"
```
*/

mod config;
mod deploy;
mod ecs;
mod env_vars;
mod error;
mod task_definition;

use crate::config::ExecutionRoles;
use crate::deploy::{DeployArgs, DeployRequest};
use crate::ecs::EcsClient;
use crate::error::Result;
use clap::Parser;
use log::info;
use simplelog::{CombinedLogger, Config as LogConfig, ConfigBuilder, LevelFilter, SimpleLogger};
use std::path::PathBuf;
use std::process;

/// Updates an ECS service to a new task definition revision
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value = "INFO")]
    /// How much detail to log; from least to most: ERROR, WARN, INFO, DEBUG, TRACE
    log_level: LevelFilter,

    #[arg(long)]
    /// AWS region of the cluster; uses the standard AWS configuration if not given
    region: Option<String>,

    #[arg(long)]
    /// TOML file overriding the execution role used for each target environment
    roles_config: Option<PathBuf>,

    #[command(flatten)]
    deploy: DeployArgs,
}

fn init_logger(log_level: LevelFilter) -> std::result::Result<(), log::SetLoggerError> {
    // SimpleLogger will send errors to stderr and anything less to stdout.
    // To reduce verbosity of messages related to the AWS SDK for Rust we need
    // to spin up two loggers, setting different levels for each.
    match log_level {
        LevelFilter::Info => CombinedLogger::init(vec![
            SimpleLogger::new(
                LevelFilter::Info,
                ConfigBuilder::new()
                    .add_filter_ignore_str("aws_config")
                    .add_filter_ignore_str("aws_credential_types")
                    .add_filter_ignore_str("aws_smithy")
                    .add_filter_ignore_str("tracing::span")
                    .build(),
            ),
            SimpleLogger::new(
                LevelFilter::Warn,
                ConfigBuilder::new()
                    .add_filter_allow_str("aws_config")
                    .add_filter_allow_str("aws_credential_types")
                    .add_filter_allow_str("aws_smithy")
                    .add_filter_allow_str("tracing::span")
                    .build(),
            ),
        ]),
        _ => SimpleLogger::init(log_level, LogConfig::default()),
    }
}

async fn run(args: Args) -> Result<()> {
    // Check all input before talking to ECS.
    let request = DeployRequest::try_from(&args.deploy)?;
    let roles = match &args.roles_config {
        Some(path) => {
            info!("Reading execution roles from {}", path.display());
            ExecutionRoles::from_file(path)?
        }
        None => ExecutionRoles::default(),
    };

    let client = EcsClient::new(args.region.as_deref()).await;
    let outcome = deploy::deploy(&client, &request, &roles).await?;

    println!(
        "{} -> {}",
        outcome.previous_task_definition_arn, outcome.new_task_definition_arn
    );
    Ok(())
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = init_logger(args.log_level) {
        eprintln!("Logger setup error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        eprintln!("{} error: {}", e.kind(), e);
        process::exit(1);
    }
}
