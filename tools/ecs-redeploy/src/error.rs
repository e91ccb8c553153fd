//! Provides the list of errors for `ecs-redeploy`.

use aws_sdk_ecs::error::SdkError;
use aws_sdk_ecs::operation::describe_services::DescribeServicesError;
use aws_sdk_ecs::operation::describe_task_definition::DescribeTaskDefinitionError;
use aws_sdk_ecs::operation::register_task_definition::RegisterTaskDefinitionError;
use aws_sdk_ecs::operation::update_service::UpdateServiceError;
use aws_smithy_types::error::display::DisplayErrorContext;
use snafu::Snafu;
use std::fmt;
use std::path::PathBuf;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("Failed to read roles config {}: {}", path.display(), source))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Failed to parse roles config {}: {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display(
        "Failed to parse --env-vars as a JSON list of name/value pairs: {}",
        source
    ))]
    EnvVarsJson { source: serde_json::Error },

    #[snafu(display("Environment variable '{}' is given more than once in --env-vars", name))]
    DuplicateEnvVar { name: String },

    #[snafu(display("Failed to build secret reference '{}': {}", name, source))]
    SecretBuild {
        name: String,
        source: aws_sdk_ecs::error::BuildError,
    },

    #[snafu(display(
        "Service '{}' not found in cluster '{}': {}",
        service,
        cluster,
        reason
    ))]
    ServiceNotFound {
        cluster: String,
        service: String,
        reason: String,
    },

    #[snafu(display(
        "Service '{}' in cluster '{}' has no task definition",
        service,
        cluster
    ))]
    NoTaskDefinition { cluster: String, service: String },

    #[snafu(display("Task definition '{}' not found", arn))]
    TaskDefinitionNotFound { arn: String },

    #[snafu(display("Task definition '{}' has no container definitions", arn))]
    NoContainers { arn: String },

    #[snafu(display("No container named '{}' in task definition '{}'", name, arn))]
    ContainerNotFound { name: String, arn: String },

    #[snafu(display(
        "Error describing service '{}' in cluster '{}': {}",
        service,
        cluster,
        DisplayErrorContext(source)
    ))]
    DescribeServices {
        cluster: String,
        service: String,
        source: SdkError<DescribeServicesError>,
    },

    #[snafu(display(
        "Error describing task definition '{}': {}",
        arn,
        DisplayErrorContext(source)
    ))]
    DescribeTaskDefinition {
        arn: String,
        source: SdkError<DescribeTaskDefinitionError>,
    },

    #[snafu(display(
        "Error registering task definition in family '{}': {}",
        family,
        DisplayErrorContext(source)
    ))]
    RegisterTaskDefinition {
        family: String,
        source: SdkError<RegisterTaskDefinitionError>,
    },

    #[snafu(display(
        "Error updating service '{}' in cluster '{}' to '{}': {}",
        service,
        cluster,
        arn,
        DisplayErrorContext(source)
    ))]
    UpdateService {
        cluster: String,
        service: String,
        arn: String,
        source: SdkError<UpdateServiceError>,
    },

    #[snafu(display("Missing field '{}' in {} response", field, request))]
    Missing {
        field: &'static str,
        request: &'static str,
    },
}

/// Broad classes of failure, used when reporting an error to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// A cluster, service, task definition or container doesn't exist.
    NotFound,
    /// The caller's arguments or roles file are unusable; nothing remote was changed.
    MalformedInput,
    /// A remote call failed and was not retried.
    Transient,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::MalformedInput => write!(f, "malformed input"),
            ErrorKind::Transient => write!(f, "transient"),
        }
    }
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigRead { .. }
            | Error::ConfigParse { .. }
            | Error::EnvVarsJson { .. }
            | Error::DuplicateEnvVar { .. }
            | Error::SecretBuild { .. } => ErrorKind::MalformedInput,

            Error::ServiceNotFound { .. }
            | Error::NoTaskDefinition { .. }
            | Error::TaskDefinitionNotFound { .. }
            | Error::NoContainers { .. }
            | Error::ContainerNotFound { .. } => ErrorKind::NotFound,

            Error::DescribeServices { source, .. }
                if matches!(
                    source.as_service_error(),
                    Some(DescribeServicesError::ClusterNotFoundException(_))
                ) =>
            {
                ErrorKind::NotFound
            }

            // ECS answers a describe of an unknown revision with a ClientException.
            Error::DescribeTaskDefinition { source, .. }
                if matches!(
                    source.as_service_error(),
                    Some(DescribeTaskDefinitionError::ClientException(_))
                ) =>
            {
                ErrorKind::NotFound
            }

            Error::DescribeServices { .. }
            | Error::DescribeTaskDefinition { .. }
            | Error::RegisterTaskDefinition { .. }
            | Error::UpdateService { .. }
            | Error::Missing { .. } => ErrorKind::Transient,
        }
    }
}
