use serde::{Deserialize, Serialize};
use serde_json::Value;
use tag_compliance_core::capability::{CapabilityTable, RemediationRoute, RemediationStrategy};
use tag_compliance_core::contract::{split_remediation_trigger, ChangeMessage, ResourceDescriptor};
use tag_compliance_core::tags::{plan_merge, stamp_remediation_time, MergePlan, PolicyTagSet, TagSet};
use tracing::{error, info};

use crate::adapters::clock::Clock;
use crate::adapters::parameter_store::ParameterStore;
use crate::adapters::resource_history::ResourceHistory;
use crate::adapters::tagging::{ResourceTagger, ServiceTagClient, ServiceTagClients};
use crate::config::RemediationConfig;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::policy_source::get_required_tags;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    AlreadyCompliant,
    Applied { written: TagSet },
}

/// Tags resources through the universal tagging interface.
///
/// Current tags come from the already-fetched descriptor. Every write also
/// stamps `timestamp_tag` with the remediation time.
pub struct GenericTagApplier<'a> {
    pub tagger: &'a dyn ResourceTagger,
    pub clock: &'a dyn Clock,
    pub timestamp_tag: &'a str,
}

impl GenericTagApplier<'_> {
    pub fn apply(
        &self,
        descriptor: &ResourceDescriptor,
        required: &PolicyTagSet,
    ) -> HandlerResult<ApplyOutcome> {
        let MergePlan::Apply {
            missing,
            mut merged,
        } = plan_merge(&descriptor.tags, required)
        else {
            log_already_compliant(descriptor, "tagging_api");
            return Ok(ApplyOutcome::AlreadyCompliant);
        };

        let arn = require_arn(descriptor)?;
        stamp_remediation_time(&mut merged, self.timestamp_tag, self.clock.now());
        self.tagger
            .tag_resource(arn, &merged)
            .map_err(|message| HandlerError::TaggingWrite {
                arn: arn.to_string(),
                message,
            })?;

        log_applied(descriptor, "tagging_api", &missing);
        Ok(ApplyOutcome::Applied { written: merged })
    }
}

/// Tags resources through a service's native tagging interface.
///
/// The descriptor's tag snapshot is not trusted for these services; current
/// tags are read back from the service before merging.
pub struct ServiceTagApplier<'a> {
    pub strategy: RemediationStrategy,
    pub client: &'a dyn ServiceTagClient,
}

impl ServiceTagApplier<'_> {
    pub fn apply(
        &self,
        descriptor: &ResourceDescriptor,
        required: &PolicyTagSet,
    ) -> HandlerResult<ApplyOutcome> {
        let arn = require_arn(descriptor)?;
        let current =
            self.client
                .list_tags(arn)
                .map_err(|message| HandlerError::ResourceLookup {
                    resource_type: descriptor.resource_type.clone(),
                    resource_id: descriptor.resource_id.clone(),
                    message,
                })?;

        let MergePlan::Apply { missing, merged } = plan_merge(&current, required) else {
            log_already_compliant(descriptor, self.strategy.identifier());
            return Ok(ApplyOutcome::AlreadyCompliant);
        };

        self.client
            .tag_resource(arn, &merged)
            .map_err(|message| HandlerError::TaggingWrite {
                arn: arn.to_string(),
                message,
            })?;

        log_applied(descriptor, self.strategy.identifier(), &missing);
        Ok(ApplyOutcome::Applied { written: merged })
    }
}

/// Routes a resource to exactly one applier based on the capability table.
pub struct RemediationDispatcher<'a> {
    capabilities: &'a CapabilityTable,
    generic: GenericTagApplier<'a>,
    service_clients: ServiceTagClients<'a>,
}

impl<'a> RemediationDispatcher<'a> {
    pub fn new(
        capabilities: &'a CapabilityTable,
        generic: GenericTagApplier<'a>,
        service_clients: ServiceTagClients<'a>,
    ) -> Self {
        Self {
            capabilities,
            generic,
            service_clients,
        }
    }

    pub fn dispatch(
        &self,
        resource_id: &str,
        resource_type: &str,
        descriptor: &ResourceDescriptor,
        required: &PolicyTagSet,
    ) -> HandlerResult<ApplyOutcome> {
        let route = self.capabilities.route(resource_type);
        info!(
            component = "remediation_handler",
            event = "remediation_dispatched",
            resource_id,
            resource_type,
            route = route_name(route),
            "dispatching remediation"
        );

        match route {
            RemediationRoute::Generic => self.generic.apply(descriptor, required),
            RemediationRoute::ServiceSpecific(strategy) => ServiceTagApplier {
                strategy,
                client: self.service_clients.client_for(strategy),
            }
            .apply(descriptor, required),
        }
    }
}

pub struct RemediationDependencies<'a> {
    pub parameter_store: &'a dyn ParameterStore,
    pub history: &'a dyn ResourceHistory,
    pub tagger: &'a dyn ResourceTagger,
    pub service_clients: ServiceTagClients<'a>,
    pub clock: &'a dyn Clock,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationSummary {
    pub processed: usize,
    pub applied: usize,
    pub already_compliant: usize,
}

impl RemediationSummary {
    fn record(&mut self, outcome: &ApplyOutcome) {
        self.processed += 1;
        match outcome {
            ApplyOutcome::AlreadyCompliant => self.already_compliant += 1,
            ApplyOutcome::Applied { .. } => self.applied += 1,
        }
    }
}

/// Remediates every message of a trigger in delivery order.
///
/// The first failing message aborts the rest of the batch. Tags already
/// written for earlier messages stay in place.
pub fn handle_remediation_event(
    event: Value,
    config: &RemediationConfig,
    deps: &RemediationDependencies<'_>,
) -> HandlerResult<RemediationSummary> {
    let messages = split_remediation_trigger(event)?;
    let dispatcher = RemediationDispatcher::new(
        &config.capabilities,
        GenericTagApplier {
            tagger: deps.tagger,
            clock: deps.clock,
            timestamp_tag: &config.timestamp_tag,
        },
        deps.service_clients,
    );

    let mut summary = RemediationSummary::default();
    for (index, message) in messages.iter().enumerate() {
        let outcome = remediate_message(message, config, deps, &dispatcher).map_err(|failure| {
            error!(
                component = "remediation_handler",
                event = "batch_aborted",
                message_index = index,
                skipped_messages = messages.len() - index - 1,
                error = %failure,
                "remediation failed; aborting remaining messages"
            );
            failure
        })?;
        summary.record(&outcome);
    }

    Ok(summary)
}

fn remediate_message(
    message: &ChangeMessage,
    config: &RemediationConfig,
    deps: &RemediationDependencies<'_>,
    dispatcher: &RemediationDispatcher<'_>,
) -> HandlerResult<ApplyOutcome> {
    let detail = message.decode()?.detail;
    info!(
        component = "remediation_handler",
        event = "message_received",
        resource_id = %detail.resource_id,
        resource_type = %detail.resource_type,
        "processing resource"
    );

    let descriptor = lookup_resource(deps.history, &detail.resource_type, &detail.resource_id)?;
    let required = get_required_tags(deps.parameter_store, &config.policy_path)?;
    dispatcher.dispatch(
        &detail.resource_id,
        &detail.resource_type,
        &descriptor,
        &required,
    )
}

pub fn lookup_resource(
    history: &dyn ResourceHistory,
    resource_type: &str,
    resource_id: &str,
) -> HandlerResult<ResourceDescriptor> {
    history
        .latest_configuration(resource_type, resource_id)
        .map_err(|message| HandlerError::ResourceLookup {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            message,
        })?
        .ok_or_else(|| HandlerError::ResourceNotFound {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        })
}

fn require_arn(descriptor: &ResourceDescriptor) -> HandlerResult<&str> {
    descriptor
        .arn
        .as_deref()
        .filter(|arn| !arn.is_empty())
        .ok_or_else(|| HandlerError::MissingArn {
            resource_type: descriptor.resource_type.clone(),
            resource_id: descriptor.resource_id.clone(),
        })
}

fn route_name(route: RemediationRoute) -> &'static str {
    match route {
        RemediationRoute::Generic => "tagging_api",
        RemediationRoute::ServiceSpecific(strategy) => strategy.identifier(),
    }
}

fn log_already_compliant(descriptor: &ResourceDescriptor, interface: &str) {
    info!(
        component = "remediation_handler",
        event = "remediation_skipped",
        resource_id = %descriptor.resource_id,
        interface,
        "all required tags already present"
    );
}

fn log_applied(descriptor: &ResourceDescriptor, interface: &str, missing: &TagSet) {
    let missing_tags: Vec<&str> = missing.keys().map(String::as_str).collect();
    info!(
        component = "remediation_handler",
        event = "tags_applied",
        resource_id = %descriptor.resource_id,
        interface,
        missing_tags = ?missing_tags,
        "applied missing tags"
    );
}
