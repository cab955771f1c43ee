use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tag_compliance_lambda::adapters::aws::{ConfigEvaluationSink, SsmParameterStore};
use tag_compliance_lambda::config::DetectorConfig;
use tag_compliance_lambda::handlers::detector::{
    handle_config_rule_event, DetectorDependencies, DetectorResponse,
};
use tag_compliance_lambda::logging::init_tracing;

#[derive(Clone)]
struct RuntimeDependencies {
    config: DetectorConfig,
    parameter_store: SsmParameterStore,
    sink: ConfigEvaluationSink,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<DetectorResponse, Error> {
    let handler_deps = DetectorDependencies {
        parameter_store: &deps.parameter_store,
        sink: &deps.sink,
    };
    handle_config_rule_event(event.payload, &deps.config, &handler_deps)
        .map_err(|error| Error::from(error.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = DetectorConfig::from_env().map_err(|error| Error::from(error.to_string()))?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        config,
        parameter_store: SsmParameterStore {
            client: aws_sdk_ssm::Client::new(&aws_config),
        },
        sink: ConfigEvaluationSink {
            client: aws_sdk_config::Client::new(&aws_config),
        },
    };

    lambda_runtime::run(service_fn(move |event| {
        let deps = deps.clone();
        async move { handle_request(event, &deps).await }
    }))
    .await
}
