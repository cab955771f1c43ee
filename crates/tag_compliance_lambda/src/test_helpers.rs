//! In-memory collaborators for exercising the handlers without AWS.
//!
//! Each fake records the calls it receives so tests can assert on exactly
//! which interface was written to and with what tags.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use tag_compliance_core::contract::{EvaluationRecord, ResourceDescriptor};
use tag_compliance_core::tags::TagSet;

use crate::adapters::clock::Clock;
use crate::adapters::evaluation_sink::EvaluationSink;
use crate::adapters::parameter_store::{Parameter, ParameterPage, ParameterStore};
use crate::adapters::resource_history::ResourceHistory;
use crate::adapters::tagging::{ResourceTagger, ServiceTagClient};

pub fn tags(pairs: &[(&str, &str)]) -> TagSet {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

pub fn descriptor(resource_type: &str, resource_id: &str, current: TagSet) -> ResourceDescriptor {
    ResourceDescriptor {
        resource_id: resource_id.to_string(),
        resource_type: resource_type.to_string(),
        arn: Some(format!("arn:aws:test:::{resource_id}")),
        tags: current,
        capture_time: Some(fixed_time()),
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45)
        .single()
        .expect("valid fixed time")
}

/// Serves the given pages in order, keyed by continuation token.
pub struct PagedParameterStore {
    pages: Vec<Vec<Parameter>>,
    fail: bool,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl PagedParameterStore {
    pub fn new(pages: Vec<Vec<(&str, &str)>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|page| {
                    page.into_iter()
                        .map(|(name, value)| Parameter {
                            name: name.to_string(),
                            value: value.to_string(),
                        })
                        .collect()
                })
                .collect(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_page(parameters: Vec<(&str, &str)>) -> Self {
        Self::new(vec![parameters])
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().expect("poisoned mutex").clone()
    }
}

impl ParameterStore for PagedParameterStore {
    fn parameters_by_path(
        &self,
        path: &str,
        next_token: Option<&str>,
    ) -> Result<ParameterPage, String> {
        self.requests
            .lock()
            .expect("poisoned mutex")
            .push((path.to_string(), next_token.map(str::to_string)));
        if self.fail {
            return Err("parameter store unreachable".to_string());
        }

        let index = match next_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|value| value.parse::<usize>().ok())
                .ok_or_else(|| format!("unknown token {token}"))?,
        };
        let parameters = self.pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(ParameterPage {
            parameters,
            next_token,
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(EvaluationRecord, String)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<(EvaluationRecord, String)> {
        self.records.lock().expect("poisoned mutex").clone()
    }
}

impl EvaluationSink for RecordingSink {
    fn put_evaluation(&self, record: &EvaluationRecord, result_token: &str) -> Result<(), String> {
        if self.fail {
            return Err("evaluation sink unreachable".to_string());
        }
        self.records
            .lock()
            .expect("poisoned mutex")
            .push((record.clone(), result_token.to_string()));
        Ok(())
    }
}

/// Resource history keyed by resource id; ids in `failing` return an error.
#[derive(Default)]
pub struct StaticHistory {
    items: BTreeMap<String, ResourceDescriptor>,
    failing: HashSet<String>,
    lookups: Mutex<Vec<String>>,
}

impl StaticHistory {
    pub fn new(items: Vec<ResourceDescriptor>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.resource_id.clone(), item))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, resource_id: &str) -> Self {
        self.failing.insert(resource_id.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().expect("poisoned mutex").clone()
    }
}

impl ResourceHistory for StaticHistory {
    fn latest_configuration(
        &self,
        _resource_type: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceDescriptor>, String> {
        self.lookups
            .lock()
            .expect("poisoned mutex")
            .push(resource_id.to_string());
        if self.failing.contains(resource_id) {
            return Err(format!("history lookup failed for {resource_id}"));
        }
        Ok(self.items.get(resource_id).cloned())
    }
}

#[derive(Default)]
pub struct RecordingTagger {
    writes: Mutex<Vec<(String, TagSet)>>,
    fail: bool,
}

impl RecordingTagger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<(String, TagSet)> {
        self.writes.lock().expect("poisoned mutex").clone()
    }
}

impl ResourceTagger for RecordingTagger {
    fn tag_resource(&self, arn: &str, tags: &TagSet) -> Result<(), String> {
        if self.fail {
            return Err("tagging api unavailable".to_string());
        }
        self.writes
            .lock()
            .expect("poisoned mutex")
            .push((arn.to_string(), tags.clone()));
        Ok(())
    }
}

/// Service tagging client backed by a mutable tag store, so writes are
/// visible to subsequent `list_tags` calls.
#[derive(Default)]
pub struct InMemoryServiceTags {
    tags: Mutex<BTreeMap<String, TagSet>>,
    writes: Mutex<Vec<(String, TagSet)>>,
}

impl InMemoryServiceTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(self, arn: &str, current: TagSet) -> Self {
        self.tags
            .lock()
            .expect("poisoned mutex")
            .insert(arn.to_string(), current);
        self
    }

    pub fn writes(&self) -> Vec<(String, TagSet)> {
        self.writes.lock().expect("poisoned mutex").clone()
    }

    pub fn current(&self, arn: &str) -> TagSet {
        self.tags
            .lock()
            .expect("poisoned mutex")
            .get(arn)
            .cloned()
            .unwrap_or_default()
    }
}

impl ServiceTagClient for InMemoryServiceTags {
    fn list_tags(&self, arn: &str) -> Result<TagSet, String> {
        Ok(self.current(arn))
    }

    fn tag_resource(&self, arn: &str, tags: &TagSet) -> Result<(), String> {
        self.writes
            .lock()
            .expect("poisoned mutex")
            .push((arn.to_string(), tags.clone()));
        self.tags
            .lock()
            .expect("poisoned mutex")
            .entry(arn.to_string())
            .or_default()
            .extend(tags.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(fixed_time())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
