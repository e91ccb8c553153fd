//! Builds the next revision of a task definition from the one a service is currently running.

use crate::error::{self, Result};
use aws_sdk_ecs::types::{
    Compatibility, ContainerDefinition, KeyValuePair, NetworkMode, Secret, TaskDefinition, Volume,
};
use log::{debug, warn};
use snafu::{ensure, OptionExt, ResultExt};

const USERNAME_SECRET_NAME: &str = "DB_USERNAME";
const PASSWORD_SECRET_NAME: &str = "DB_PASSWORD";

/// What changes in the container being redeployed.
#[derive(Debug, Clone)]
pub(crate) struct ContainerUpdate {
    pub(crate) image: String,
    pub(crate) environment: Vec<KeyValuePair>,
    pub(crate) username_secret_arn: String,
    pub(crate) password_secret_arn: String,
    /// Selects the container to update by name.  Without it the first container is updated and
    /// the others are left out of the new revision.
    pub(crate) container_name: Option<String>,
}

/// The parameters for a RegisterTaskDefinition call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TaskDefinitionRegistration {
    pub(crate) family: String,
    pub(crate) volumes: Option<Vec<Volume>>,
    pub(crate) container_definitions: Vec<ContainerDefinition>,
    pub(crate) cpu: Option<String>,
    pub(crate) memory: Option<String>,
    pub(crate) network_mode: Option<NetworkMode>,
    pub(crate) requires_compatibilities: Option<Vec<Compatibility>>,
    pub(crate) execution_role_arn: String,
    pub(crate) task_role_arn: Option<String>,
}

/// Copies `current` into a registration, applying `update` to one container and swapping in the
/// given execution role.  Everything else is carried over unchanged.
pub(crate) fn build_registration(
    current: &TaskDefinition,
    update: &ContainerUpdate,
    execution_role_arn: &str,
) -> Result<TaskDefinitionRegistration> {
    let arn = current.task_definition_arn.as_deref().unwrap_or_default();
    let family = current.family.clone().context(error::MissingSnafu {
        field: "taskDefinition.family",
        request: "DescribeTaskDefinition",
    })?;

    let containers = current.container_definitions.clone().unwrap_or_default();
    ensure!(!containers.is_empty(), error::NoContainersSnafu { arn });

    let container_definitions = match &update.container_name {
        Some(name) => {
            let mut containers = containers;
            let target = containers
                .iter_mut()
                .find(|c| c.name.as_deref() == Some(name.as_str()))
                .context(error::ContainerNotFoundSnafu { name, arn })?;
            apply_update(target, update)?;
            containers
        }
        None => {
            let mut containers = containers.into_iter();
            // Checked non-empty above.
            let mut first = containers.next().context(error::NoContainersSnafu { arn })?;
            let dropped: Vec<String> = containers
                .map(|c| c.name.unwrap_or_else(|| "<unnamed>".to_string()))
                .collect();
            if !dropped.is_empty() {
                warn!(
                    "Only the first container is kept in the new revision; dropping {}",
                    dropped.join(", ")
                );
            }
            apply_update(&mut first, update)?;
            vec![first]
        }
    };

    Ok(TaskDefinitionRegistration {
        family,
        volumes: current.volumes.clone(),
        container_definitions,
        cpu: current.cpu.clone(),
        memory: current.memory.clone(),
        network_mode: current.network_mode.clone(),
        requires_compatibilities: current.requires_compatibilities.clone(),
        execution_role_arn: execution_role_arn.to_string(),
        task_role_arn: current.task_role_arn.clone(),
    })
}

/// Replaces the image, environment and secrets of one container.  The environment and secrets
/// are replaced outright, never merged.
fn apply_update(container: &mut ContainerDefinition, update: &ContainerUpdate) -> Result<()> {
    debug!(
        "Updating container {:?}: image {:?} -> {:?}",
        container.name, container.image, update.image
    );
    container.image = Some(update.image.clone());
    container.environment = Some(update.environment.clone());
    container.secrets = Some(vec![
        secret(USERNAME_SECRET_NAME, &update.username_secret_arn)?,
        secret(PASSWORD_SECRET_NAME, &update.password_secret_arn)?,
    ]);
    Ok(())
}

fn secret(name: &str, value_from: &str) -> Result<Secret> {
    Secret::builder()
        .name(name)
        .value_from(value_from)
        .build()
        .context(error::SecretBuildSnafu { name })
}
