use crate::contract::ContractError;
use crate::tags::PolicyTagSet;

pub const DEFAULT_POLICY_PATH: &str = "/auto-tagging/mandatory/";

/// Validates a parameter hierarchy root and ensures it ends with `/`.
pub fn normalize_policy_path(path: &str) -> Result<String, ContractError> {
    let trimmed = path.trim();
    if !trimmed.starts_with('/') {
        return Err(ContractError::new(format!(
            "Policy path '{trimmed}' must start with '/'"
        )));
    }
    if trimmed.len() == 1 {
        return Err(ContractError::new("Policy path cannot be the root '/'"));
    }

    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/"))
    }
}

/// Leaf segment of a hierarchical parameter name.
pub fn tag_name_from_parameter(parameter_name: &str) -> &str {
    match parameter_name.rsplit_once('/') {
        Some((_, leaf)) => leaf,
        None => parameter_name,
    }
}

/// Builds the policy from `(parameter name, value)` pairs in read order.
///
/// Parameters in nested paths sharing a leaf name collapse to one tag; the
/// later pair wins.
pub fn policy_from_parameters<I, N, V>(parameters: I) -> PolicyTagSet
where
    I: IntoIterator<Item = (N, V)>,
    N: AsRef<str>,
    V: Into<String>,
{
    parameters
        .into_iter()
        .map(|(name, value)| {
            (
                tag_name_from_parameter(name.as_ref()).to_string(),
                value.into(),
            )
        })
        .collect()
}
