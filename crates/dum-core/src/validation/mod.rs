//! Admission checks run on every inbound request before routing
//!
//! Each check either admits the request or hands back the single failure
//! response to send. None of them touch manager state.

pub mod request_validator;
pub mod to_validator;

pub use request_validator::validate_request;
pub use to_validator::validate_to_target;
