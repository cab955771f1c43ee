use tag_compliance_core::policy_path::policy_from_parameters;
use tag_compliance_core::tags::PolicyTagSet;
use tracing::info;

use crate::adapters::parameter_store::ParameterStore;
use crate::error::{HandlerError, HandlerResult};

/// Reads the full mandatory-tag policy under `path`, following pagination.
///
/// Always goes to the store; callers get whatever is current at call time.
pub fn get_required_tags(store: &dyn ParameterStore, path: &str) -> HandlerResult<PolicyTagSet> {
    let mut parameters = Vec::new();
    let mut next_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .parameters_by_path(path, next_token.as_deref())
            .map_err(|message| HandlerError::PolicySource {
                path: path.to_string(),
                message,
            })?;
        pages += 1;
        parameters.extend(
            page.parameters
                .into_iter()
                .map(|parameter| (parameter.name, parameter.value)),
        );

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    let policy = policy_from_parameters(parameters);
    info!(
        component = "policy_source",
        event = "policy_loaded",
        path,
        pages,
        required_tags = policy.len(),
        policy_fingerprint = %policy.fingerprint(),
        "loaded mandatory tag policy"
    );
    Ok(policy)
}
