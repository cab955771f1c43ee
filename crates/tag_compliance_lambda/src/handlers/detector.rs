use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tag_compliance_core::compliance::{compare, ComplianceType, ComplianceVerdict};
use tag_compliance_core::contract::{parse_config_rule_event, ContractError, EvaluationRecord};
use tracing::info;

use crate::adapters::evaluation_sink::EvaluationSink;
use crate::adapters::parameter_store::ParameterStore;
use crate::config::DetectorConfig;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::policy_source::get_required_tags;

pub struct DetectorDependencies<'a> {
    pub parameter_store: &'a dyn ParameterStore,
    pub sink: &'a dyn EvaluationSink,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectorResponse {
    pub resource_type: String,
    pub resource_id: String,
    pub compliance_type: ComplianceType,
    pub annotation: String,
}

/// Evaluates one config-rule invocation and reports exactly one verdict.
pub fn handle_config_rule_event(
    event: Value,
    config: &DetectorConfig,
    deps: &DetectorDependencies<'_>,
) -> HandlerResult<DetectorResponse> {
    let invocation = parse_config_rule_event(event)?;
    let resource = invocation.resource;
    let capture_time = resource.capture_time.ok_or_else(|| {
        ContractError::new("configurationItem has no configurationItemCaptureTime")
    })?;

    info!(
        component = "detector",
        event = "evaluation_started",
        resource_type = %resource.resource_type,
        resource_id = %resource.resource_id,
        current_tags = resource.tags.len(),
        "evaluating resource tags"
    );

    let required = get_required_tags(deps.parameter_store, &config.policy_path)?;
    let verdict = compare(&resource.tags, &required);

    report(
        deps.sink,
        &resource.resource_type,
        &resource.resource_id,
        &verdict,
        capture_time,
        &invocation.result_token,
    )?;

    Ok(DetectorResponse {
        resource_type: resource.resource_type,
        resource_id: resource.resource_id,
        compliance_type: verdict.status,
        annotation: verdict.annotation,
    })
}

pub fn report(
    sink: &dyn EvaluationSink,
    resource_type: &str,
    resource_id: &str,
    verdict: &ComplianceVerdict,
    capture_time: DateTime<Utc>,
    result_token: &str,
) -> HandlerResult<()> {
    let record = EvaluationRecord::new(resource_type, resource_id, verdict, capture_time);
    sink.put_evaluation(&record, result_token)
        .map_err(|message| HandlerError::EvaluationSink {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            message,
        })?;

    info!(
        component = "detector",
        event = "evaluation_reported",
        resource_type,
        resource_id,
        compliance_type = verdict.status.as_str(),
        annotation = %record.annotation,
        "reported compliance evaluation"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tag_compliance_core::compliance::COMPLIANT_ANNOTATION;
    use tag_compliance_core::contract::MAX_ANNOTATION_CHARS;
    use tag_compliance_core::policy_path::DEFAULT_POLICY_PATH;

    use super::*;
    use crate::test_helpers::{PagedParameterStore, RecordingSink};

    fn config() -> DetectorConfig {
        DetectorConfig {
            policy_path: DEFAULT_POLICY_PATH.to_string(),
        }
    }

    fn rule_event(tags: Value, capture_time: Option<&str>) -> Value {
        let mut item = json!({
            "resourceType": "AWS::S3::Bucket",
            "resourceId": "logs-bucket",
            "ARN": "arn:aws:s3:::logs-bucket",
            "tags": tags,
        });
        if let Some(time) = capture_time {
            item["configurationItemCaptureTime"] = json!(time);
        }
        json!({
            "invokingEvent": json!({"configurationItem": item}).to_string(),
            "resultToken": "result-token-7"
        })
    }

    fn policy_store() -> PagedParameterStore {
        PagedParameterStore::single_page(vec![
            ("/auto-tagging/mandatory/env", "prod"),
            ("/auto-tagging/mandatory/owner", "x"),
        ])
    }

    #[test]
    fn reports_compliant_resource_once_with_result_token() {
        let store = policy_store();
        let sink = RecordingSink::new();
        let deps = DetectorDependencies {
            parameter_store: &store,
            sink: &sink,
        };

        let response = handle_config_rule_event(
            rule_event(
                json!({"env": "prod", "owner": "x", "extra": "y"}),
                Some("2024-05-01T10:15:30Z"),
            ),
            &config(),
            &deps,
        )
        .expect("evaluation should succeed");

        assert_eq!(response.compliance_type, ComplianceType::Compliant);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        let (record, token) = &records[0];
        assert_eq!(token, "result-token-7");
        assert_eq!(record.compliance_resource_type, "AWS::S3::Bucket");
        assert_eq!(record.compliance_resource_id, "logs-bucket");
        assert_eq!(record.annotation, COMPLIANT_ANNOTATION);
        assert_eq!(record.ordering_timestamp.to_rfc3339(), "2024-05-01T10:15:30+00:00");
    }

    #[test]
    fn reports_non_compliant_diff() {
        let store = policy_store();
        let sink = RecordingSink::new();
        let deps = DetectorDependencies {
            parameter_store: &store,
            sink: &sink,
        };

        handle_config_rule_event(
            rule_event(json!({"env": "dev"}), Some("2024-05-01T10:15:30Z")),
            &config(),
            &deps,
        )
        .expect("evaluation should succeed");

        let (record, _) = &sink.records()[0];
        assert_eq!(record.compliance_type, ComplianceType::NonCompliant);
        assert_eq!(
            record.annotation,
            "Missing tags: owner. Incorrect tags: env (expected: prod, got: dev)."
        );
    }

    #[test]
    fn sink_failure_is_fatal() {
        let store = policy_store();
        let sink = RecordingSink::unreachable();
        let deps = DetectorDependencies {
            parameter_store: &store,
            sink: &sink,
        };

        let error = handle_config_rule_event(
            rule_event(json!({}), Some("2024-05-01T10:15:30Z")),
            &config(),
            &deps,
        )
        .expect_err("sink failure should propagate");

        assert!(matches!(error, HandlerError::EvaluationSink { .. }));
    }

    #[test]
    fn policy_failure_reports_nothing() {
        let store = PagedParameterStore::unreachable();
        let sink = RecordingSink::new();
        let deps = DetectorDependencies {
            parameter_store: &store,
            sink: &sink,
        };

        let error = handle_config_rule_event(
            rule_event(json!({}), Some("2024-05-01T10:15:30Z")),
            &config(),
            &deps,
        )
        .expect_err("policy failure should propagate");

        assert!(matches!(error, HandlerError::PolicySource { .. }));
        assert!(sink.records().is_empty());
    }

    #[test]
    fn missing_capture_time_is_rejected_before_policy_read() {
        let store = policy_store();
        let sink = RecordingSink::new();
        let deps = DetectorDependencies {
            parameter_store: &store,
            sink: &sink,
        };

        let error = handle_config_rule_event(rule_event(json!({}), None), &config(), &deps)
            .expect_err("missing capture time should fail");

        assert!(matches!(error, HandlerError::InvalidEvent(_)));
        assert!(store.requests().is_empty());
    }

    #[test]
    fn oversized_annotation_is_truncated_for_the_sink() {
        let names: Vec<String> = (0..60).map(|index| format!("required-tag-{index:02}")).collect();
        let parameters: Vec<(String, &str)> = names
            .iter()
            .map(|name| (format!("/auto-tagging/mandatory/{name}"), "v"))
            .collect();
        let store = PagedParameterStore::single_page(
            parameters
                .iter()
                .map(|(name, value)| (name.as_str(), *value))
                .collect(),
        );
        let sink = RecordingSink::new();
        let deps = DetectorDependencies {
            parameter_store: &store,
            sink: &sink,
        };

        let response = handle_config_rule_event(
            rule_event(json!({}), Some("2024-05-01T10:15:30Z")),
            &config(),
            &deps,
        )
        .expect("evaluation should succeed");

        let (record, _) = &sink.records()[0];
        assert_eq!(record.annotation.chars().count(), MAX_ANNOTATION_CHARS);
        assert!(response.annotation.len() > MAX_ANNOTATION_CHARS);
    }
}
