use tag_compliance_core::contract::ResourceDescriptor;

pub trait ResourceHistory {
    /// Most recent configuration snapshot, or `None` when nothing is recorded.
    fn latest_configuration(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceDescriptor>, String>;
}
