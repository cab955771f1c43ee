pub mod detector;
pub mod policy_source;
pub mod remediation;
