//! Secret Validator - `${secrets.<key>}` references vs loaded secrets

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TemplarError};
use crate::references::collect_template_references;

pub const SECRETS_PREFIX: &str = "secrets";

/// A configuration to check, with the name used in error messages
#[derive(Debug, Clone, Copy)]
pub struct NamedConfig<'a> {
    pub name: &'a str,
    pub value: &'a Value,
}

impl<'a> NamedConfig<'a> {
    pub fn new(name: &'a str, value: &'a Value) -> Self {
        Self { name, value }
    }
}

/// Secret keys referenced by each config but absent from `loaded`
///
/// Only configs with at least one missing key are returned, keys sorted.
pub fn detect_missing_secret_keys(
    configs: &[NamedConfig<'_>],
    loaded: &BTreeSet<String>,
) -> Result<Vec<(String, Vec<String>)>> {
    let mut missing = Vec::new();

    for config in configs {
        let keys: BTreeSet<String> = collect_template_references(config.value)?
            .into_iter()
            .filter(|path| path.len() > 1 && path[0] == SECRETS_PREFIX)
            .map(|mut path| path.swap_remove(1))
            .filter(|key| !loaded.contains(key))
            .collect();

        if !keys.is_empty() {
            missing.push((config.name.to_string(), keys.into_iter().collect()));
        }
    }

    Ok(missing)
}

/// Fail with one aggregated error when any referenced secret is not loaded
pub fn throw_on_missing_secret_keys(
    configs: &[NamedConfig<'_>],
    loaded: &BTreeSet<String>,
    entity_label: &str,
) -> Result<()> {
    let missing = detect_missing_secret_keys(configs, loaded)?;
    debug!(
        configs = configs.len(),
        failing = missing.len(),
        "checked secret references"
    );

    if missing.is_empty() {
        return Ok(());
    }

    let lines: Vec<String> = missing
        .iter()
        .map(|(name, keys)| format!("{} {}: {}", entity_label, name, keys.join(", ")))
        .collect();

    let footer = if loaded.is_empty() {
        "Note: No secrets have been loaded. If you have defined secrets for the current \
         project and environment, this may indicate a problem with your configuration."
            .to_string()
    } else {
        format!(
            "Secret keys with loaded values: {}",
            loaded.iter().cloned().collect::<Vec<_>>().join(", ")
        )
    };

    Err(TemplarError::MissingSecrets {
        message: format!(
            "The following secret names were referenced in configuration, but are missing \
             from the loaded secrets:\n\n{}\n\n{}",
            lines.join("\n"),
            footer
        ),
        missing,
    })
}
