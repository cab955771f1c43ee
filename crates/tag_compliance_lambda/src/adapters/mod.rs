pub mod aws;
pub mod clock;
pub mod evaluation_sink;
pub mod parameter_store;
pub mod resource_history;
pub mod tagging;
