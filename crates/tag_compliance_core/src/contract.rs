use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compliance::{ComplianceType, ComplianceVerdict};
use crate::tags::TagSet;

/// Upper bound the evaluation sink accepts for an annotation.
pub const MAX_ANNOTATION_CHARS: usize = 256;
const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ContractError {
    message: String,
}

impl ContractError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Config rule invocation as delivered to the detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigRuleEvent {
    #[serde(rename = "invokingEvent")]
    pub invoking_event: String,
    #[serde(rename = "resultToken")]
    pub result_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvokingEvent {
    #[serde(rename = "configurationItem", default)]
    pub configuration_item: Option<ConfigurationItem>,
    #[serde(rename = "messageType", default)]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationItem {
    pub resource_type: String,
    pub resource_id: String,
    #[serde(rename = "ARN", default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub tags: Option<TagSet>,
    #[serde(default)]
    pub configuration_item_capture_time: Option<String>,
}

impl ConfigurationItem {
    pub fn into_descriptor(self) -> Result<ResourceDescriptor, ContractError> {
        let capture_time = self
            .configuration_item_capture_time
            .as_deref()
            .map(parse_capture_time)
            .transpose()?;

        Ok(ResourceDescriptor {
            resource_id: self.resource_id,
            resource_type: self.resource_type,
            arn: self.arn,
            tags: self.tags.unwrap_or_default(),
            capture_time,
        })
    }
}

/// Latest known state of a single resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub resource_id: String,
    pub resource_type: String,
    pub arn: Option<String>,
    pub tags: TagSet,
    pub capture_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInvocation {
    pub result_token: String,
    pub resource: ResourceDescriptor,
}

pub fn parse_config_rule_event(event: Value) -> Result<RuleInvocation, ContractError> {
    let rule_event: ConfigRuleEvent = serde_json::from_value(event)
        .map_err(|error| ContractError::new(format!("Malformed config rule event: {error}")))?;
    let invoking_event: InvokingEvent = serde_json::from_str(&rule_event.invoking_event)
        .map_err(|error| ContractError::new(format!("Malformed invokingEvent: {error}")))?;

    let Some(item) = invoking_event.configuration_item else {
        return Err(ContractError::new(format!(
            "invokingEvent has no configurationItem (messageType={})",
            invoking_event.message_type.as_deref().unwrap_or("unknown")
        )));
    };

    Ok(RuleInvocation {
        result_token: rule_event.result_token,
        resource: item.into_descriptor()?,
    })
}

fn parse_capture_time(text: &str) -> Result<DateTime<Utc>, ContractError> {
    DateTime::parse_from_rfc3339(text)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            ContractError::new(format!(
                "configurationItemCaptureTime '{text}' is not RFC 3339: {error}"
            ))
        })
}

/// Compliance-change notification forwarded to the remediation handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeNotification {
    pub detail: ChangeDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetail {
    pub resource_id: String,
    pub resource_type: String,
}

/// One undecoded unit of remediation work.
///
/// Decoding is deferred so that a malformed message only fails when the batch
/// reaches it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeMessage {
    QueueRecord(Value),
    Direct(Value),
}

impl ChangeMessage {
    pub fn decode(&self) -> Result<ChangeNotification, ContractError> {
        match self {
            Self::QueueRecord(record) => {
                let body = record
                    .get("body")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ContractError::new("Queue record body must be a string"))?;
                serde_json::from_str(body).map_err(|error| {
                    ContractError::new(format!("Invalid change notification body: {error}"))
                })
            }
            Self::Direct(event) => serde_json::from_value(event.clone()).map_err(|error| {
                ContractError::new(format!("Invalid change notification: {error}"))
            }),
        }
    }
}

/// Splits a remediation trigger into its messages, preserving delivery order.
///
/// Queue batches (`Records`) yield one message per record; a bare
/// notification carrying `detail` yields a single message.
pub fn split_remediation_trigger(event: Value) -> Result<Vec<ChangeMessage>, ContractError> {
    if let Some(records) = event.get("Records") {
        let records = records
            .as_array()
            .ok_or_else(|| ContractError::new("Records must be an array"))?;
        return Ok(records.iter().cloned().map(ChangeMessage::QueueRecord).collect());
    }

    if event.get("detail").is_some() {
        return Ok(vec![ChangeMessage::Direct(event)]);
    }

    Err(ContractError::new(
        "Remediation event must carry Records or a detail object",
    ))
}

/// One evaluation as accepted by the compliance sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct EvaluationRecord {
    pub compliance_resource_type: String,
    pub compliance_resource_id: String,
    pub compliance_type: ComplianceType,
    pub annotation: String,
    pub ordering_timestamp: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn new(
        resource_type: &str,
        resource_id: &str,
        verdict: &ComplianceVerdict,
        ordering_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            compliance_resource_type: resource_type.to_string(),
            compliance_resource_id: resource_id.to_string(),
            compliance_type: verdict.status,
            annotation: truncate_annotation(&verdict.annotation, MAX_ANNOTATION_CHARS),
            ordering_timestamp,
        }
    }
}

pub fn truncate_annotation(annotation: &str, max_chars: usize) -> String {
    if annotation.chars().count() <= max_chars {
        return annotation.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.len());
    let mut truncated: String = annotation.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
