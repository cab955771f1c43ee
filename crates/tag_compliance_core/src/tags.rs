use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_TIMESTAMP_TAG: &str = "autotagging-timestamp";
pub const REMEDIATION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Tag name to tag value. Iteration is lexicographic by tag name.
pub type TagSet = BTreeMap<String, String>;

/// The mandatory tag baseline resolved for a single invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTagSet {
    tags: TagSet,
}

impl PolicyTagSet {
    pub fn new(tags: TagSet) -> Self {
        Self { tags }
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Required tags that `current` lacks or carries with a different value.
    pub fn missing_from(&self, current: &TagSet) -> TagSet {
        self.tags
            .iter()
            .filter(|(name, value)| current.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_satisfied_by(&self, current: &TagSet) -> bool {
        self.tags
            .iter()
            .all(|(name, value)| current.get(name) == Some(value))
    }

    /// Stable hex digest of the policy contents, used to correlate log lines
    /// emitted under the same policy revision.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.tags {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0xffu8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

impl FromIterator<(String, String)> for PolicyTagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl From<TagSet> for PolicyTagSet {
    fn from(tags: TagSet) -> Self {
        Self::new(tags)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePlan {
    AlreadyCompliant,
    Apply { missing: TagSet, merged: TagSet },
}

/// Decides whether a write is needed and, if so, which tag set to write.
///
/// The merged set keeps every current tag and overlays the required values.
pub fn plan_merge(current: &TagSet, required: &PolicyTagSet) -> MergePlan {
    let missing = required.missing_from(current);
    if missing.is_empty() {
        return MergePlan::AlreadyCompliant;
    }

    MergePlan::Apply {
        missing,
        merged: merge_tags(current, required),
    }
}

pub fn merge_tags(current: &TagSet, required: &PolicyTagSet) -> TagSet {
    let mut merged = current.clone();
    for (name, value) in required.iter() {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

pub fn format_remediation_timestamp(now: DateTime<Utc>) -> String {
    now.format(REMEDIATION_TIMESTAMP_FORMAT).to_string()
}

pub fn stamp_remediation_time(tags: &mut TagSet, tag_name: &str, now: DateTime<Utc>) {
    tags.insert(tag_name.to_string(), format_remediation_timestamp(now));
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn plan_merge_is_noop_when_policy_is_subset() {
        let current = tags(&[("env", "prod"), ("owner", "x"), ("extra", "1")]);
        let required = PolicyTagSet::new(tags(&[("env", "prod"), ("owner", "x")]));

        assert_eq!(plan_merge(&current, &required), MergePlan::AlreadyCompliant);
    }

    #[test]
    fn plan_merge_overlays_required_values_and_keeps_existing_tags() {
        let current = tags(&[("env", "dev"), ("cost-center", "42")]);
        let required = PolicyTagSet::new(tags(&[("env", "prod"), ("team", "y")]));

        let MergePlan::Apply { missing, merged } = plan_merge(&current, &required) else {
            panic!("expected a merge");
        };

        assert_eq!(missing, tags(&[("env", "prod"), ("team", "y")]));
        assert_eq!(
            merged,
            tags(&[("cost-center", "42"), ("env", "prod"), ("team", "y")])
        );
    }

    #[test]
    fn empty_policy_is_always_satisfied() {
        let required = PolicyTagSet::default();
        assert!(required.is_satisfied_by(&TagSet::new()));
        assert_eq!(plan_merge(&TagSet::new(), &required), MergePlan::AlreadyCompliant);
    }

    #[test]
    fn remediation_timestamp_uses_second_precision_utc() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .expect("valid timestamp");
        let mut merged = TagSet::new();
        stamp_remediation_time(&mut merged, DEFAULT_TIMESTAMP_TAG, now);

        assert_eq!(
            merged.get(DEFAULT_TIMESTAMP_TAG).map(String::as_str),
            Some("2024-03-09 07:05:01 UTC")
        );
    }

    #[test]
    fn fingerprint_tracks_policy_contents() {
        let a = PolicyTagSet::new(tags(&[("env", "prod")]));
        let b = PolicyTagSet::new(tags(&[("env", "prod")]));
        let c = PolicyTagSet::new(tags(&[("env", "dev")]));

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
