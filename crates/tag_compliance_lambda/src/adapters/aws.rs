//! AWS SDK implementations of the collaborator traits.
//!
//! The traits are synchronous, so each call parks the current worker with
//! `block_in_place` and drives the SDK future on the ambient runtime. This
//! requires the multi-thread tokio runtime the Lambda binaries start.

use std::collections::HashMap;

use aws_sdk_config::error::DisplayErrorContext;
use aws_sdk_config::primitives::DateTime as ConfigDateTime;
use aws_sdk_config::types::{ComplianceType as ConfigComplianceType, Evaluation, ResourceType};
use aws_sdk_eventbridge::types::Tag as EventBridgeTag;
use chrono::{DateTime, Utc};
use tag_compliance_core::compliance::ComplianceType;
use tag_compliance_core::contract::{EvaluationRecord, ResourceDescriptor};
use tag_compliance_core::tags::TagSet;

use crate::adapters::evaluation_sink::EvaluationSink;
use crate::adapters::parameter_store::{Parameter, ParameterPage, ParameterStore};
use crate::adapters::resource_history::ResourceHistory;
use crate::adapters::tagging::{ResourceTagger, ServiceTagClient};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

#[derive(Clone)]
pub struct SsmParameterStore {
    pub client: aws_sdk_ssm::Client,
}

impl ParameterStore for SsmParameterStore {
    fn parameters_by_path(
        &self,
        path: &str,
        next_token: Option<&str>,
    ) -> Result<ParameterPage, String> {
        let client = self.client.clone();
        let path = path.to_string();
        let next_token = next_token.map(str::to_string);

        block_on(async move {
            let output = client
                .get_parameters_by_path()
                .path(path)
                .recursive(true)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to list parameters by path: {}",
                        aws_sdk_ssm::error::DisplayErrorContext(&error)
                    )
                })?;

            let parameters = output
                .parameters()
                .iter()
                .filter_map(|parameter| {
                    Some(Parameter {
                        name: parameter.name()?.to_string(),
                        value: parameter.value()?.to_string(),
                    })
                })
                .collect();

            Ok(ParameterPage {
                parameters,
                next_token: output.next_token().map(str::to_string),
            })
        })
    }
}

#[derive(Clone)]
pub struct ConfigEvaluationSink {
    pub client: aws_sdk_config::Client,
}

impl EvaluationSink for ConfigEvaluationSink {
    fn put_evaluation(&self, record: &EvaluationRecord, result_token: &str) -> Result<(), String> {
        let compliance_type = match record.compliance_type {
            ComplianceType::Compliant => ConfigComplianceType::Compliant,
            ComplianceType::NonCompliant => ConfigComplianceType::NonCompliant,
        };
        let evaluation = Evaluation::builder()
            .compliance_resource_type(record.compliance_resource_type.clone())
            .compliance_resource_id(record.compliance_resource_id.clone())
            .compliance_type(compliance_type)
            .annotation(record.annotation.clone())
            .ordering_timestamp(ConfigDateTime::from_secs_and_nanos(
                record.ordering_timestamp.timestamp(),
                record.ordering_timestamp.timestamp_subsec_nanos(),
            ))
            .build()
            .map_err(|error| format!("invalid evaluation record: {error}"))?;

        let client = self.client.clone();
        let result_token = result_token.to_string();

        block_on(async move {
            let output = client
                .put_evaluations()
                .evaluations(evaluation)
                .result_token(result_token)
                .send()
                .await
                .map_err(|error| {
                    format!("failed to put evaluation: {}", DisplayErrorContext(&error))
                })?;

            let rejected = output.failed_evaluations().len();
            if rejected > 0 {
                return Err(format!("config rejected {rejected} evaluation(s)"));
            }
            Ok(())
        })
    }
}

#[derive(Clone)]
pub struct ConfigResourceHistory {
    pub client: aws_sdk_config::Client,
}

impl ResourceHistory for ConfigResourceHistory {
    fn latest_configuration(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceDescriptor>, String> {
        let client = self.client.clone();
        let resource_type = resource_type.to_string();
        let resource_id = resource_id.to_string();

        block_on(async move {
            let output = client
                .get_resource_config_history()
                .resource_type(ResourceType::from(resource_type.as_str()))
                .resource_id(resource_id.clone())
                .limit(1)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to read configuration history: {}",
                        DisplayErrorContext(&error)
                    )
                })?;

            let Some(item) = output.configuration_items().first() else {
                return Ok(None);
            };

            let tags: TagSet = item
                .tags()
                .map(|tags| {
                    tags.iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default();
            let capture_time = item
                .configuration_item_capture_time()
                .and_then(|time| DateTime::<Utc>::from_timestamp(time.secs(), time.subsec_nanos()));

            Ok(Some(ResourceDescriptor {
                resource_id: item.resource_id().unwrap_or(resource_id.as_str()).to_string(),
                resource_type,
                arn: item.arn().map(str::to_string),
                tags,
                capture_time,
            }))
        })
    }
}

#[derive(Clone)]
pub struct TaggingApiTagger {
    pub client: aws_sdk_resourcegroupstagging::Client,
}

impl ResourceTagger for TaggingApiTagger {
    fn tag_resource(&self, arn: &str, tags: &TagSet) -> Result<(), String> {
        let client = self.client.clone();
        let arn = arn.to_string();
        let tags: HashMap<String, String> = tags.clone().into_iter().collect();

        block_on(async move {
            let output = client
                .tag_resources()
                .resource_arn_list(arn.clone())
                .set_tags(Some(tags))
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to tag resource: {}",
                        aws_sdk_resourcegroupstagging::error::DisplayErrorContext(&error)
                    )
                })?;

            if let Some(failure) = output
                .failed_resources_map()
                .and_then(|failures| failures.get(&arn))
            {
                return Err(format!(
                    "tagging api reported failure: {}",
                    failure.error_message().unwrap_or("no error message")
                ));
            }
            Ok(())
        })
    }
}

#[derive(Clone)]
pub struct EventBridgeTagClient {
    pub client: aws_sdk_eventbridge::Client,
}

impl ServiceTagClient for EventBridgeTagClient {
    fn list_tags(&self, arn: &str) -> Result<TagSet, String> {
        let client = self.client.clone();
        let arn = arn.to_string();

        block_on(async move {
            let output = client
                .list_tags_for_resource()
                .resource_arn(arn)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to list eventbridge tags: {}",
                        aws_sdk_eventbridge::error::DisplayErrorContext(&error)
                    )
                })?;

            Ok(output
                .tags()
                .iter()
                .map(|tag| (tag.key().to_string(), tag.value().to_string()))
                .collect())
        })
    }

    fn tag_resource(&self, arn: &str, tags: &TagSet) -> Result<(), String> {
        let tags = tags
            .iter()
            .map(|(name, value)| {
                EventBridgeTag::builder()
                    .key(name)
                    .value(value)
                    .build()
                    .map_err(|error| format!("invalid eventbridge tag '{name}': {error}"))
            })
            .collect::<Result<Vec<_>, String>>()?;
        let client = self.client.clone();
        let arn = arn.to_string();

        block_on(async move {
            client
                .tag_resource()
                .resource_arn(arn)
                .set_tags(Some(tags))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| {
                    format!(
                        "failed to tag eventbridge resource: {}",
                        aws_sdk_eventbridge::error::DisplayErrorContext(&error)
                    )
                })
        })
    }
}
