use tag_compliance_core::capability::RemediationStrategy;
use tag_compliance_core::tags::TagSet;

/// Universal tagging write interface, addressed by resource ARN.
pub trait ResourceTagger {
    fn tag_resource(&self, arn: &str, tags: &TagSet) -> Result<(), String>;
}

/// Native tagging interface of a service the universal interface cannot reach.
pub trait ServiceTagClient {
    fn list_tags(&self, arn: &str) -> Result<TagSet, String>;
    fn tag_resource(&self, arn: &str, tags: &TagSet) -> Result<(), String>;
}

/// One client per service-specific strategy.
#[derive(Clone, Copy)]
pub struct ServiceTagClients<'a> {
    pub eventbridge: &'a dyn ServiceTagClient,
}

impl<'a> ServiceTagClients<'a> {
    pub fn client_for(&self, strategy: RemediationStrategy) -> &'a dyn ServiceTagClient {
        match strategy {
            RemediationStrategy::EventBridge => self.eventbridge,
        }
    }
}
