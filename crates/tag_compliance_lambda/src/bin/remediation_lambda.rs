use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tag_compliance_lambda::adapters::aws::{
    ConfigResourceHistory, EventBridgeTagClient, SsmParameterStore, TaggingApiTagger,
};
use tag_compliance_lambda::adapters::clock::SystemClock;
use tag_compliance_lambda::adapters::tagging::ServiceTagClients;
use tag_compliance_lambda::config::RemediationConfig;
use tag_compliance_lambda::handlers::remediation::{
    handle_remediation_event, RemediationDependencies, RemediationSummary,
};
use tag_compliance_lambda::logging::init_tracing;
use tracing::info;

#[derive(Clone)]
struct RuntimeDependencies {
    config: RemediationConfig,
    parameter_store: SsmParameterStore,
    history: ConfigResourceHistory,
    tagger: TaggingApiTagger,
    eventbridge: EventBridgeTagClient,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<RemediationSummary, Error> {
    let handler_deps = RemediationDependencies {
        parameter_store: &deps.parameter_store,
        history: &deps.history,
        tagger: &deps.tagger,
        service_clients: ServiceTagClients {
            eventbridge: &deps.eventbridge,
        },
        clock: &SystemClock,
    };
    handle_remediation_event(event.payload, &deps.config, &handler_deps)
        .map_err(|error| Error::from(error.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    // An unknown strategy in the unsupported-service table stops the cold
    // start here instead of failing individual events.
    let config = RemediationConfig::from_env().map_err(|error| Error::from(error.to_string()))?;
    info!(
        component = "remediation_handler",
        event = "config_loaded",
        policy_path = %config.policy_path,
        unsupported_types = config.capabilities.len(),
        "remediation handler configured"
    );

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        config,
        parameter_store: SsmParameterStore {
            client: aws_sdk_ssm::Client::new(&aws_config),
        },
        history: ConfigResourceHistory {
            client: aws_sdk_config::Client::new(&aws_config),
        },
        tagger: TaggingApiTagger {
            client: aws_sdk_resourcegroupstagging::Client::new(&aws_config),
        },
        eventbridge: EventBridgeTagClient {
            client: aws_sdk_eventbridge::Client::new(&aws_config),
        },
    };

    lambda_runtime::run(service_fn(move |event| {
        let deps = deps.clone();
        async move { handle_request(event, &deps).await }
    }))
    .await
}
