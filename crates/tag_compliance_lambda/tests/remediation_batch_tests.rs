use serde_json::{json, Value};
use tag_compliance_core::tags::{TagSet, DEFAULT_TIMESTAMP_TAG};
use tag_compliance_lambda::adapters::tagging::ServiceTagClients;
use tag_compliance_lambda::config::RemediationConfig;
use tag_compliance_lambda::error::HandlerError;
use tag_compliance_lambda::handlers::remediation::{
    handle_remediation_event, RemediationDependencies, RemediationSummary,
};
use tag_compliance_lambda::test_helpers::{
    descriptor, tags, FixedClock, InMemoryServiceTags, PagedParameterStore, RecordingTagger,
    StaticHistory,
};

fn queue_record(resource_id: &str, resource_type: &str) -> Value {
    json!({
        "eventSource": "aws:sqs",
        "body": json!({
            "source": "aws.config",
            "detail-type": "Config Rules Compliance Change",
            "detail": {
                "resourceId": resource_id,
                "resourceType": resource_type,
                "configRuleName": "required-tags"
            }
        }).to_string()
    })
}

fn config() -> RemediationConfig {
    RemediationConfig::from_lookup(|_| None).expect("default config loads")
}

fn policy_store() -> PagedParameterStore {
    PagedParameterStore::single_page(vec![
        ("/auto-tagging/mandatory/env", "prod"),
        ("/auto-tagging/mandatory/owner", "platform"),
    ])
}

struct Fixture {
    store: PagedParameterStore,
    history: StaticHistory,
    tagger: RecordingTagger,
    eventbridge: InMemoryServiceTags,
    clock: FixedClock,
}

impl Fixture {
    fn new(history: StaticHistory) -> Self {
        Self {
            store: policy_store(),
            history,
            tagger: RecordingTagger::new(),
            eventbridge: InMemoryServiceTags::new(),
            clock: FixedClock::default(),
        }
    }

    fn run(&self, event: Value) -> Result<RemediationSummary, HandlerError> {
        let deps = RemediationDependencies {
            parameter_store: &self.store,
            history: &self.history,
            tagger: &self.tagger,
            service_clients: ServiceTagClients {
                eventbridge: &self.eventbridge,
            },
            clock: &self.clock,
        };
        handle_remediation_event(event, &config(), &deps)
    }
}

#[test]
fn failed_lookup_aborts_remaining_batch_after_applying_earlier_messages() {
    let fixture = Fixture::new(
        StaticHistory::new(vec![
            descriptor("AWS::S3::Bucket", "first", TagSet::new()),
            descriptor("AWS::S3::Bucket", "third", TagSet::new()),
        ])
        .failing_for("second"),
    );

    let error = fixture
        .run(json!({
            "Records": [
                queue_record("first", "AWS::S3::Bucket"),
                queue_record("second", "AWS::S3::Bucket"),
                queue_record("third", "AWS::S3::Bucket"),
            ]
        }))
        .expect_err("second message should abort the batch");

    assert!(matches!(error, HandlerError::ResourceLookup { .. }));
    let writes = fixture.tagger.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, "arn:aws:test:::first");
    assert_eq!(fixture.history.lookups(), vec!["first", "second"]);
}

#[test]
fn missing_snapshot_is_a_lookup_miss() {
    let fixture = Fixture::new(StaticHistory::new(Vec::new()));

    let error = fixture
        .run(json!({"Records": [queue_record("ghost", "AWS::S3::Bucket")]}))
        .expect_err("missing snapshot should fail");

    assert!(matches!(error, HandlerError::ResourceNotFound { .. }));
    assert!(fixture.tagger.writes().is_empty());
}

#[test]
fn malformed_body_only_fails_when_reached() {
    let fixture = Fixture::new(StaticHistory::new(vec![descriptor(
        "AWS::S3::Bucket",
        "first",
        TagSet::new(),
    )]));

    let error = fixture
        .run(json!({
            "Records": [
                queue_record("first", "AWS::S3::Bucket"),
                {"eventSource": "aws:sqs", "body": "{\"detail\":{}}"}
            ]
        }))
        .expect_err("malformed body should fail");

    assert!(matches!(error, HandlerError::InvalidEvent(_)));
    assert_eq!(fixture.tagger.writes().len(), 1);
}

#[test]
fn mixed_batch_routes_each_resource_and_summarizes() {
    let bus_arn = "arn:aws:test:::bus";
    let mut fixture = Fixture::new(StaticHistory::new(vec![
        descriptor("AWS::S3::Bucket", "logs", tags(&[("keep", "me")])),
        descriptor(
            "AWS::EC2::Instance",
            "i-compliant",
            tags(&[("env", "prod"), ("owner", "platform")]),
        ),
        descriptor("AWS::Events::EventBus", "bus", TagSet::new()),
    ]));
    fixture.eventbridge = InMemoryServiceTags::new().with_tags(bus_arn, tags(&[("env", "dev")]));

    let summary = fixture
        .run(json!({
            "Records": [
                queue_record("logs", "AWS::S3::Bucket"),
                queue_record("i-compliant", "AWS::EC2::Instance"),
                queue_record("bus", "AWS::Events::EventBus"),
            ]
        }))
        .expect("batch should succeed");

    assert_eq!(
        summary,
        RemediationSummary {
            processed: 3,
            applied: 2,
            already_compliant: 1,
        }
    );

    let generic_writes = fixture.tagger.writes();
    assert_eq!(generic_writes.len(), 1);
    assert_eq!(
        generic_writes[0].1.get("keep").map(String::as_str),
        Some("me")
    );
    assert!(generic_writes[0].1.contains_key(DEFAULT_TIMESTAMP_TAG));

    assert_eq!(
        fixture.eventbridge.current(bus_arn),
        tags(&[("env", "prod"), ("owner", "platform")])
    );
    assert!(!fixture
        .eventbridge
        .current(bus_arn)
        .contains_key(DEFAULT_TIMESTAMP_TAG));
}

#[test]
fn direct_notification_is_processed_as_single_message() {
    let fixture = Fixture::new(StaticHistory::new(vec![descriptor(
        "AWS::S3::Bucket",
        "logs",
        TagSet::new(),
    )]));

    let summary = fixture
        .run(json!({
            "detail": {"resourceId": "logs", "resourceType": "AWS::S3::Bucket"}
        }))
        .expect("direct event should succeed");

    assert_eq!(summary.applied, 1);
}

#[test]
fn policy_is_reread_for_every_message() {
    let fixture = Fixture::new(StaticHistory::new(vec![
        descriptor("AWS::S3::Bucket", "a", TagSet::new()),
        descriptor("AWS::S3::Bucket", "b", TagSet::new()),
    ]));

    fixture
        .run(json!({
            "Records": [
                queue_record("a", "AWS::S3::Bucket"),
                queue_record("b", "AWS::S3::Bucket"),
            ]
        }))
        .expect("batch should succeed");

    assert_eq!(fixture.store.requests().len(), 2);
}
