//! Shared tag-compliance domain primitives.
//!
//! This crate owns the pure tagging behavior: tag-set comparison, merge
//! planning, the unsupported-service capability table, and the event and
//! record contracts exchanged with the handlers. It intentionally excludes
//! AWS SDK and Lambda runtime concerns.

pub mod capability;
pub mod compliance;
pub mod contract;
pub mod policy_path;
pub mod tags;
