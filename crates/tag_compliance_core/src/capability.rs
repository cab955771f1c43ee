use std::collections::BTreeMap;

use crate::contract::ContractError;

/// Unsupported-service table shipped with the handlers.
pub const BUNDLED_UNSUPPORTED_SERVICES: &str =
    include_str!("../config/tagging_api_unsupported_services.json");

/// Service-specific tagging strategies known to the remediation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemediationStrategy {
    EventBridge,
}

impl RemediationStrategy {
    pub const ALL: [Self; 1] = [Self::EventBridge];

    pub fn identifier(self) -> &'static str {
        match self {
            Self::EventBridge => "validate_and_apply_tags_eventbridge",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier.trim() {
            "validate_and_apply_tags_eventbridge" | "eventbridge" => Some(Self::EventBridge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationRoute {
    /// Resource types the universal tagging interface handles.
    Generic,
    ServiceSpecific(RemediationStrategy),
}

/// Resource types that must be tagged through a service-specific interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityTable {
    entries: BTreeMap<String, RemediationStrategy>,
}

impl CapabilityTable {
    pub fn bundled() -> Result<Self, ContractError> {
        Self::from_json(BUNDLED_UNSUPPORTED_SERVICES)
    }

    /// Parses a `{ "<resourceType>": "<strategy identifier>" }` document.
    ///
    /// Every identifier must name a known strategy; the first unknown one
    /// fails the whole table.
    pub fn from_json(text: &str) -> Result<Self, ContractError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(text).map_err(|error| {
            ContractError::new(format!("Malformed unsupported-service table: {error}"))
        })?;

        let mut entries = BTreeMap::new();
        for (resource_type, identifier) in raw {
            if resource_type.trim().is_empty() {
                return Err(ContractError::new(
                    "unsupported-service table contains an empty resource type",
                ));
            }
            let strategy = RemediationStrategy::from_identifier(&identifier).ok_or_else(|| {
                ContractError::new(format!(
                    "Resource type '{resource_type}' names unknown remediation strategy '{identifier}'"
                ))
            })?;
            entries.insert(resource_type, strategy);
        }

        Ok(Self { entries })
    }

    pub fn route(&self, resource_type: &str) -> RemediationRoute {
        match self.entries.get(resource_type) {
            Some(strategy) => RemediationRoute::ServiceSpecific(*strategy),
            None => RemediationRoute::Generic,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RemediationStrategy)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, RemediationStrategy)> for CapabilityTable {
    fn from_iter<I: IntoIterator<Item = (String, RemediationStrategy)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
