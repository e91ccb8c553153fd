//! The deploy module owns the redeploy flow: read the service's task definition, register a
//! mutated copy, and point the service at it.

use crate::config::{ExecutionRoles, TargetEnv};
use crate::ecs::EcsApi;
use crate::env_vars::parse_env_vars;
use crate::error::Result;
use crate::task_definition::{build_registration, ContainerUpdate};
use clap::Parser;
use log::{info, warn};

/// Redeploys an ECS service with a new image, environment and database secrets
#[derive(Debug, Parser)]
pub(crate) struct DeployArgs {
    /// Name of the ECS cluster
    #[arg(long)]
    cluster: String,

    /// Name of the ECS service
    #[arg(long)]
    service: String,

    /// Container image for the updated application
    #[arg(long)]
    image: String,

    /// ARN of the secret holding the database username
    #[arg(long)]
    username_secret_arn: String,

    /// ARN of the secret holding the database password
    #[arg(long)]
    password_secret_arn: String,

    /// Target environment; only 'production' selects the production execution role
    #[arg(long)]
    target_env: String,

    /// JSON list of {"name": ..., "value": ...} objects; replaces the container's environment
    #[arg(long)]
    env_vars: String,

    /// Update the container with this name and keep the task's other containers.  By default
    /// the first container is updated and any others are dropped from the new revision.
    #[arg(long)]
    container_name: Option<String>,
}

/// A validated deployment.  Building one checks all user input, so a failure here happens
/// before any request is sent to ECS.
#[derive(Debug, Clone)]
pub(crate) struct DeployRequest {
    pub(crate) cluster: String,
    pub(crate) service: String,
    pub(crate) target_env: TargetEnv,
    pub(crate) container: ContainerUpdate,
}

impl TryFrom<&DeployArgs> for DeployRequest {
    type Error = crate::error::Error;

    fn try_from(args: &DeployArgs) -> Result<Self> {
        let target_env = TargetEnv::from(args.target_env.as_str());
        let environment = parse_env_vars(&args.env_vars)?;
        Ok(Self {
            cluster: args.cluster.clone(),
            service: args.service.clone(),
            target_env,
            container: ContainerUpdate {
                image: args.image.clone(),
                environment,
                username_secret_arn: args.username_secret_arn.clone(),
                password_secret_arn: args.password_secret_arn.clone(),
                container_name: args.container_name.clone(),
            },
        })
    }
}

/// The task definitions the service ran before and after the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeployOutcome {
    pub(crate) previous_task_definition_arn: String,
    pub(crate) new_task_definition_arn: String,
}

/// Runs the deployment.  Calls are made one at a time and none are undone on failure; if the
/// service update fails, the newly registered revision stays registered.
pub(crate) async fn deploy<C>(
    client: &C,
    request: &DeployRequest,
    roles: &ExecutionRoles,
) -> Result<DeployOutcome>
where
    C: EcsApi + ?Sized,
{
    info!("Fetching current task definition...");
    let previous_arn = client
        .current_task_definition_arn(&request.cluster, &request.service)
        .await?;
    info!("Current task definition ARN: {}", previous_arn);
    let current = client.describe_task_definition(&previous_arn).await?;

    let execution_role = roles.role_for(request.target_env);
    info!(
        "Using execution role '{}' for {}",
        execution_role, request.target_env
    );
    let registration = build_registration(&current, &request.container, execution_role)?;
    info!("Updated container image to: {}", request.container.image);

    info!("Registering new task definition...");
    let new_arn = client.register_task_definition(registration).await?;
    info!("New task definition ARN: {}", new_arn);

    info!("Updating ECS service with the new task definition...");
    if let Err(e) = client
        .update_service(&request.cluster, &request.service, &new_arn)
        .await
    {
        warn!(
            "Task definition '{}' was registered but service '{}' was not updated; it remains registered and unused",
            new_arn, request.service
        );
        return Err(e);
    }
    info!("Service updated successfully!");

    Ok(DeployOutcome {
        previous_task_definition_arn: previous_arn,
        new_task_definition_arn: new_arn,
    })
}
