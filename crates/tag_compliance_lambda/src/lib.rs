//! AWS-oriented adapters and handlers for mandatory tag enforcement.
//!
//! This crate owns runtime integration details (Lambda handlers, collaborator
//! traits and their AWS SDK implementations) on top of the pure tagging
//! primitives in `tag_compliance_core`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
