use std::fs;

use tag_compliance_core::capability::CapabilityTable;
use tag_compliance_core::policy_path::{normalize_policy_path, DEFAULT_POLICY_PATH};
use tag_compliance_core::tags::DEFAULT_TIMESTAMP_TAG;

use crate::error::{HandlerError, HandlerResult};

pub const POLICY_PATH_ENV: &str = "TAG_POLICY_PATH";
pub const UNSUPPORTED_SERVICES_FILE_ENV: &str = "UNSUPPORTED_SERVICES_FILE";
pub const TIMESTAMP_TAG_ENV: &str = "REMEDIATION_TIMESTAMP_TAG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    pub policy_path: String,
}

impl DetectorConfig {
    pub fn from_env() -> HandlerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HandlerResult<Self> {
        Ok(Self {
            policy_path: resolve_policy_path(&lookup)?,
        })
    }
}

/// Remediation settings, resolved once per cold start.
///
/// Loading fails if the unsupported-service table names a strategy this
/// build does not implement, so misconfiguration never reaches an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationConfig {
    pub policy_path: String,
    pub timestamp_tag: String,
    pub capabilities: CapabilityTable,
}

impl RemediationConfig {
    pub fn from_env() -> HandlerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HandlerResult<Self> {
        let timestamp_tag = match lookup(TIMESTAMP_TAG_ENV) {
            None => DEFAULT_TIMESTAMP_TAG.to_string(),
            Some(value) if value.trim().is_empty() => {
                return Err(HandlerError::Configuration(format!(
                    "{TIMESTAMP_TAG_ENV} cannot be empty"
                )));
            }
            Some(value) => value.trim().to_string(),
        };

        Ok(Self {
            policy_path: resolve_policy_path(&lookup)?,
            timestamp_tag,
            capabilities: load_capability_table(lookup(UNSUPPORTED_SERVICES_FILE_ENV).as_deref())?,
        })
    }
}

fn resolve_policy_path(lookup: &impl Fn(&str) -> Option<String>) -> HandlerResult<String> {
    let raw = lookup(POLICY_PATH_ENV).unwrap_or_else(|| DEFAULT_POLICY_PATH.to_string());
    normalize_policy_path(&raw).map_err(|error| HandlerError::Configuration(error.to_string()))
}

/// Reads the table from `file` when given, otherwise uses the bundled one.
pub fn load_capability_table(file: Option<&str>) -> HandlerResult<CapabilityTable> {
    let table = match file {
        None => CapabilityTable::bundled(),
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|error| {
                HandlerError::Configuration(format!(
                    "failed to read unsupported-service table '{path}': {error}"
                ))
            })?;
            CapabilityTable::from_json(&text)
        }
    };

    table.map_err(|error| HandlerError::Configuration(error.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tag_compliance_core::capability::{RemediationRoute, RemediationStrategy};

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = RemediationConfig::from_lookup(lookup_from(&[])).expect("defaults load");

        assert_eq!(config.policy_path, DEFAULT_POLICY_PATH);
        assert_eq!(config.timestamp_tag, DEFAULT_TIMESTAMP_TAG);
        assert_eq!(
            config.capabilities.route("AWS::Events::Rule"),
            RemediationRoute::ServiceSpecific(RemediationStrategy::EventBridge)
        );
    }

    #[test]
    fn policy_path_override_is_normalized() {
        let config = DetectorConfig::from_lookup(lookup_from(&[(POLICY_PATH_ENV, "/tags/required")]))
            .expect("override loads");
        assert_eq!(config.policy_path, "/tags/required/");
    }

    #[test]
    fn relative_policy_path_is_a_configuration_error() {
        let error = DetectorConfig::from_lookup(lookup_from(&[(POLICY_PATH_ENV, "tags")]))
            .expect_err("relative path should fail");
        assert!(matches!(error, HandlerError::Configuration(_)));
    }

    #[test]
    fn empty_timestamp_tag_is_rejected() {
        let error = RemediationConfig::from_lookup(lookup_from(&[(TIMESTAMP_TAG_ENV, "  ")]))
            .expect_err("empty tag should fail");
        assert!(error.to_string().contains(TIMESTAMP_TAG_ENV));
    }

    #[test]
    fn table_file_with_unknown_strategy_fails_at_load() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(br#"{"AWS::SNS::Topic": "validate_and_apply_tags_sns"}"#)
            .expect("write table");
        let path = file.path().to_string_lossy().to_string();

        let error = RemediationConfig::from_lookup(lookup_from(&[(
            UNSUPPORTED_SERVICES_FILE_ENV,
            path.as_str(),
        )]))
        .expect_err("unknown strategy should fail");

        assert!(matches!(error, HandlerError::Configuration(_)));
        assert!(error.to_string().contains("validate_and_apply_tags_sns"));
    }

    #[test]
    fn missing_table_file_is_a_configuration_error() {
        let error = load_capability_table(Some("/nonexistent/unsupported.json"))
            .expect_err("missing file should fail");
        assert!(error.to_string().contains("/nonexistent/unsupported.json"));
    }
}
