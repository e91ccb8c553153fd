//! Target environments and the execution roles assigned to them.

use crate::error::{self, Result};
use log::warn;
use serde::Deserialize;
use snafu::ResultExt;
use std::fmt;
use std::fs;
use std::path::Path;

const PRODUCTION_EXECUTION_ROLE: &str = "production_ecs_task_execution_role";
const DEVELOPMENT_EXECUTION_ROLE: &str = "dev_ecs_task_execution_role";

/// The environment a deployment targets.  Only the exact label `production` selects
/// production; every other label deploys with the development role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TargetEnv {
    Production,
    Development,
}

impl From<&str> for TargetEnv {
    fn from(label: &str) -> Self {
        match label {
            "production" => TargetEnv::Production,
            "development" | "dev" => TargetEnv::Development,
            _ => {
                warn!(
                    "Target environment '{}' is not 'production', using the development role",
                    label
                );
                TargetEnv::Development
            }
        }
    }
}

impl fmt::Display for TargetEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetEnv::Production => write!(f, "production"),
            TargetEnv::Development => write!(f, "development"),
        }
    }
}

/// Execution role identifier for each target environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExecutionRoles {
    production: String,
    development: String,
}

impl Default for ExecutionRoles {
    fn default() -> Self {
        Self {
            production: PRODUCTION_EXECUTION_ROLE.to_string(),
            development: DEVELOPMENT_EXECUTION_ROLE.to_string(),
        }
    }
}

/// On-disk shape of the roles file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RolesFile {
    #[serde(default)]
    execution_roles: RoleOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleOverrides {
    production: Option<String>,
    development: Option<String>,
}

impl ExecutionRoles {
    /// Loads role overrides from a TOML file.  Environments missing from the file keep their
    /// built-in role.
    pub(crate) fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).context(error::ConfigReadSnafu { path })?;
        let file: RolesFile = toml::from_str(&s).context(error::ConfigParseSnafu { path })?;

        let defaults = Self::default();
        let overrides = file.execution_roles;
        Ok(Self {
            production: overrides.production.unwrap_or(defaults.production),
            development: overrides.development.unwrap_or(defaults.development),
        })
    }

    pub(crate) fn role_for(&self, target_env: TargetEnv) -> &str {
        match target_env {
            TargetEnv::Production => &self.production,
            TargetEnv::Development => &self.development,
        }
    }
}
