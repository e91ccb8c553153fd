//! The ecs module owns the four ECS control-plane calls a deployment makes.

use crate::error::{self, Result};
use crate::task_definition::TaskDefinitionRegistration;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ecs::types::TaskDefinition;
use aws_smithy_types::retry::RetryConfig;
use aws_types::region::Region;
use log::{debug, trace};
use snafu::{ensure, OptionExt, ResultExt};

// Status ECS reports for a service that has been deleted but not yet forgotten
const INACTIVE_SERVICE_STATUS: &str = "INACTIVE";

/// The subset of the ECS API used to redeploy a service.
#[async_trait]
pub(crate) trait EcsApi {
    /// Returns the ARN of the task definition the service currently runs.
    async fn current_task_definition_arn(&self, cluster: &str, service: &str) -> Result<String>;

    async fn describe_task_definition(&self, arn: &str) -> Result<TaskDefinition>;

    /// Registers a new revision and returns its ARN.
    async fn register_task_definition(
        &self,
        registration: TaskDefinitionRegistration,
    ) -> Result<String>;

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition_arn: &str,
    ) -> Result<()>;
}

/// `EcsApi` backed by the AWS SDK.
pub(crate) struct EcsClient {
    client: aws_sdk_ecs::Client,
}

impl EcsClient {
    /// Builds a client from the standard AWS configuration chain.  Retries are disabled so each
    /// call is made exactly once.
    pub(crate) async fn new(region: Option<&str>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).retry_config(RetryConfig::disabled());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_owned()));
        }
        let config = loader.load().await;
        debug!("Using AWS region {:?}", config.region());

        Self::from(aws_sdk_ecs::Client::new(&config))
    }
}

impl From<aws_sdk_ecs::Client> for EcsClient {
    fn from(client: aws_sdk_ecs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EcsApi for EcsClient {
    async fn current_task_definition_arn(&self, cluster: &str, service: &str) -> Result<String> {
        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(service)
            .send()
            .await
            .context(error::DescribeServicesSnafu { cluster, service })?;
        trace!("DescribeServices response: {:?}", output);

        // ECS reports unknown services as failures rather than as an error.
        let reason = output
            .failures
            .unwrap_or_default()
            .into_iter()
            .find_map(|failure| failure.reason)
            .unwrap_or_else(|| "MISSING".to_string());
        let described = output
            .services
            .unwrap_or_default()
            .into_iter()
            .next()
            .context(error::ServiceNotFoundSnafu {
                cluster,
                service,
                reason,
            })?;

        ensure!(
            described.status.as_deref() != Some(INACTIVE_SERVICE_STATUS),
            error::ServiceNotFoundSnafu {
                cluster,
                service,
                reason: INACTIVE_SERVICE_STATUS,
            }
        );

        described
            .task_definition
            .context(error::NoTaskDefinitionSnafu { cluster, service })
    }

    async fn describe_task_definition(&self, arn: &str) -> Result<TaskDefinition> {
        self.client
            .describe_task_definition()
            .task_definition(arn)
            .send()
            .await
            .context(error::DescribeTaskDefinitionSnafu { arn })?
            .task_definition
            .context(error::TaskDefinitionNotFoundSnafu { arn })
    }

    async fn register_task_definition(
        &self,
        registration: TaskDefinitionRegistration,
    ) -> Result<String> {
        let family = registration.family.clone();
        self.client
            .register_task_definition()
            .family(registration.family)
            .set_volumes(registration.volumes)
            .set_container_definitions(Some(registration.container_definitions))
            .set_cpu(registration.cpu)
            .set_memory(registration.memory)
            .set_network_mode(registration.network_mode)
            .set_requires_compatibilities(registration.requires_compatibilities)
            .execution_role_arn(registration.execution_role_arn)
            .set_task_role_arn(registration.task_role_arn)
            .send()
            .await
            .context(error::RegisterTaskDefinitionSnafu { family })?
            .task_definition
            .and_then(|task_definition| task_definition.task_definition_arn)
            .context(error::MissingSnafu {
                field: "taskDefinition.taskDefinitionArn",
                request: "RegisterTaskDefinition",
            })
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition_arn: &str,
    ) -> Result<()> {
        let output = self
            .client
            .update_service()
            .cluster(cluster)
            .service(service)
            .task_definition(task_definition_arn)
            .send()
            .await
            .context(error::UpdateServiceSnafu {
                cluster,
                service,
                arn: task_definition_arn,
            })?;
        debug!(
            "Service status after update: {:?}",
            output.service.and_then(|s| s.status)
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use aws_sdk_ecs::operation::describe_services::{DescribeServicesError, DescribeServicesOutput};
    use aws_sdk_ecs::operation::describe_task_definition::DescribeTaskDefinitionError;
    use aws_sdk_ecs::operation::register_task_definition::RegisterTaskDefinitionOutput;
    use aws_sdk_ecs::operation::update_service::UpdateServiceError;
    use aws_sdk_ecs::types::error::{ClientException, ClusterNotFoundException, ServerException};
    use aws_sdk_ecs::types::{ContainerDefinition, Failure, Service};
    use aws_smithy_mocks::{mock, mock_client};

    const CLUSTER: &str = "c1";
    const SERVICE: &str = "s1";
    const CURRENT_ARN: &str = "arn:aws:ecs:us-west-2:111122223333:task-definition/f1:7";
    const NEW_ARN: &str = "arn:aws:ecs:us-west-2:111122223333:task-definition/f1:8";

    #[tokio::test]
    async fn active_service() {
        let rule = mock!(aws_sdk_ecs::Client::describe_services)
            .match_requests(|req| {
                req.cluster() == Some(CLUSTER) && req.services() == [SERVICE.to_string()]
            })
            .then_output(|| {
                DescribeServicesOutput::builder()
                    .services(
                        Service::builder()
                            .service_name(SERVICE)
                            .status("ACTIVE")
                            .task_definition(CURRENT_ARN)
                            .build(),
                    )
                    .build()
            });
        let ecs = EcsClient::from(mock_client!(aws_sdk_ecs, [&rule]));

        let arn = ecs
            .current_task_definition_arn(CLUSTER, SERVICE)
            .await
            .unwrap();
        assert_eq!(arn, CURRENT_ARN);
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn service_reported_as_failure() {
        let rule = mock!(aws_sdk_ecs::Client::describe_services).then_output(|| {
            DescribeServicesOutput::builder()
                .failures(
                    Failure::builder()
                        .arn("arn:aws:ecs:us-west-2:111122223333:service/c1/s1")
                        .reason("MISSING")
                        .build(),
                )
                .build()
        });
        let ecs = EcsClient::from(mock_client!(aws_sdk_ecs, [&rule]));

        let err = ecs
            .current_task_definition_arn(CLUSTER, SERVICE)
            .await
            .unwrap_err();
        match err {
            Error::ServiceNotFound { ref reason, .. } => assert_eq!(reason, "MISSING"),
            ref other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn inactive_service() {
        let rule = mock!(aws_sdk_ecs::Client::describe_services).then_output(|| {
            DescribeServicesOutput::builder()
                .services(
                    Service::builder()
                        .service_name(SERVICE)
                        .status("INACTIVE")
                        .task_definition(CURRENT_ARN)
                        .build(),
                )
                .build()
        });
        let ecs = EcsClient::from(mock_client!(aws_sdk_ecs, [&rule]));

        let err = ecs
            .current_task_definition_arn(CLUSTER, SERVICE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServiceNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn unknown_cluster() {
        let rule = mock!(aws_sdk_ecs::Client::describe_services).then_error(|| {
            DescribeServicesError::ClusterNotFoundException(
                ClusterNotFoundException::builder()
                    .message("Cluster not found.")
                    .build(),
            )
        });
        let ecs = EcsClient::from(mock_client!(aws_sdk_ecs, [&rule]));

        let err = ecs
            .current_task_definition_arn(CLUSTER, SERVICE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DescribeServices { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn unknown_task_definition() {
        let rule = mock!(aws_sdk_ecs::Client::describe_task_definition).then_error(|| {
            DescribeTaskDefinitionError::ClientException(
                ClientException::builder()
                    .message("Unable to describe task definition.")
                    .build(),
            )
        });
        let ecs = EcsClient::from(mock_client!(aws_sdk_ecs, [&rule]));

        let err = ecs.describe_task_definition(CURRENT_ARN).await.unwrap_err();
        assert!(matches!(err, Error::DescribeTaskDefinition { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn register_sends_registration() {
        let rule = mock!(aws_sdk_ecs::Client::register_task_definition)
            .match_requests(|req| {
                req.family() == Some("f1")
                    && req.execution_role_arn() == Some("production_ecs_task_execution_role")
                    && req.task_role_arn().is_none()
                    && req.container_definitions().len() == 1
            })
            .then_output(|| {
                RegisterTaskDefinitionOutput::builder()
                    .task_definition(TaskDefinition::builder().task_definition_arn(NEW_ARN).build())
                    .build()
            });
        let ecs = EcsClient::from(mock_client!(aws_sdk_ecs, [&rule]));

        let registration = TaskDefinitionRegistration {
            family: "f1".to_string(),
            volumes: None,
            container_definitions: vec![ContainerDefinition::builder()
                .name("app")
                .image("new:2")
                .build()],
            cpu: Some("256".to_string()),
            memory: Some("512".to_string()),
            network_mode: None,
            requires_compatibilities: None,
            execution_role_arn: "production_ecs_task_execution_role".to_string(),
            task_role_arn: None,
        };
        let arn = ecs.register_task_definition(registration).await.unwrap();
        assert_eq!(arn, NEW_ARN);
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn failed_update_is_transient() {
        let rule = mock!(aws_sdk_ecs::Client::update_service).then_error(|| {
            UpdateServiceError::ServerException(
                ServerException::builder().message("internal").build(),
            )
        });
        let ecs = EcsClient::from(mock_client!(aws_sdk_ecs, [&rule]));

        let err = ecs
            .update_service(CLUSTER, SERVICE, NEW_ARN)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpdateService { .. }));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
