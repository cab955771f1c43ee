use serde::{Deserialize, Serialize};

use crate::tags::{PolicyTagSet, TagSet};

pub const COMPLIANT_ANNOTATION: &str = "All required tags are present and correct.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceType {
    Compliant,
    NonCompliant,
}

impl ComplianceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON_COMPLIANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub status: ComplianceType,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncorrectTag {
    pub name: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub missing: Vec<String>,
    pub incorrect: Vec<IncorrectTag>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.incorrect.is_empty()
    }
}

/// Classifies every required tag against the resource's current tags.
///
/// Extra tags on the resource are ignored. Values are compared byte for byte.
pub fn diff_tags(current: &TagSet, required: &PolicyTagSet) -> TagDiff {
    let mut diff = TagDiff::default();
    for (name, expected) in required.iter() {
        match current.get(name) {
            None => diff.missing.push(name.clone()),
            Some(actual) if actual != expected => diff.incorrect.push(IncorrectTag {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            }),
            Some(_) => {}
        }
    }
    diff
}

pub fn compare(current: &TagSet, required: &PolicyTagSet) -> ComplianceVerdict {
    let diff = diff_tags(current, required);
    if diff.is_empty() {
        return ComplianceVerdict {
            status: ComplianceType::Compliant,
            annotation: COMPLIANT_ANNOTATION.to_string(),
        };
    }

    ComplianceVerdict {
        status: ComplianceType::NonCompliant,
        annotation: build_annotation(&diff),
    }
}

fn build_annotation(diff: &TagDiff) -> String {
    let mut clauses = Vec::with_capacity(2);
    if !diff.missing.is_empty() {
        clauses.push(format!("Missing tags: {}.", diff.missing.join(", ")));
    }
    if !diff.incorrect.is_empty() {
        let rendered: Vec<String> = diff
            .incorrect
            .iter()
            .map(|tag| {
                format!(
                    "{} (expected: {}, got: {})",
                    tag.name, tag.expected, tag.actual
                )
            })
            .collect();
        clauses.push(format!("Incorrect tags: {}.", rendered.join(", ")));
    }
    clauses.join(" ")
}
