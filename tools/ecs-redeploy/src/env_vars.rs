//! Parses the `--env-vars` argument into ECS key/value pairs.

use crate::error::{self, Result};
use aws_sdk_ecs::types::KeyValuePair;
use serde::Deserialize;
use serde_json::{Map, Value};
use snafu::{ensure, ResultExt};
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvironmentVariable {
    name: String,
    value: String,
}

/// Parses a JSON array of `{"name": ..., "value": ...}` objects.  The result replaces a
/// container's environment wholesale, so names must be unique.
pub(crate) fn parse_env_vars(input: &str) -> Result<Vec<KeyValuePair>> {
    // Each entry is taken as a JSON object first; a derived struct Deserialize would also
    // accept the positional `["name", "value"]` form.
    let entries: Vec<Map<String, Value>> =
        serde_json::from_str(input).context(error::EnvVarsJsonSnafu)?;
    let vars = entries
        .into_iter()
        .map(|entry| serde_json::from_value::<EnvironmentVariable>(Value::Object(entry)))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context(error::EnvVarsJsonSnafu)?;

    let mut seen = HashSet::with_capacity(vars.len());
    for var in &vars {
        ensure!(
            seen.insert(var.name.as_str()),
            error::DuplicateEnvVarSnafu { name: &var.name }
        );
    }

    Ok(vars
        .into_iter()
        .map(|var| KeyValuePair::builder().name(var.name).value(var.value).build())
        .collect())
}
