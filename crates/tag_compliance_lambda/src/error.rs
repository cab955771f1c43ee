use tag_compliance_core::contract::ContractError;
use thiserror::Error;

/// Failures that abort a handler invocation.
///
/// Every variant surfaces to the invoking platform; nothing here is retried
/// locally.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to read tag policy under '{path}': {message}")]
    PolicySource { path: String, message: String },

    #[error("failed to report evaluation for {resource_type} '{resource_id}': {message}")]
    EvaluationSink {
        resource_type: String,
        resource_id: String,
        message: String,
    },

    #[error("no configuration history found for {resource_type} '{resource_id}'")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    #[error("configuration history lookup failed for {resource_type} '{resource_id}': {message}")]
    ResourceLookup {
        resource_type: String,
        resource_id: String,
        message: String,
    },

    #[error("{resource_type} '{resource_id}' has no ARN to tag")]
    MissingArn {
        resource_type: String,
        resource_id: String,
    },

    #[error("failed to write tags to '{arn}': {message}")]
    TaggingWrite { arn: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid event: {0}")]
    InvalidEvent(#[from] ContractError),
}

pub type HandlerResult<T> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let error = HandlerError::ResourceNotFound {
            resource_type: "AWS::S3::Bucket".to_string(),
            resource_id: "logs".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "no configuration history found for AWS::S3::Bucket 'logs'"
        );

        let error = HandlerError::from(ContractError::new("Records must be an array"));
        assert_eq!(error.to_string(), "invalid event: Records must be an array");
    }
}
