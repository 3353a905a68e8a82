//! SIP response creation utilities

use super::headers::{HeaderAccess, TypedHeader};
use super::request::Request;
use super::response::Response;
use super::status::StatusCode;

/// Generate a random tag for a To or From header
pub fn generate_tag() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// Create a response to `request`
///
/// Copies Via, From, To, Call-ID and CSeq; the To tag is left as the request
/// carried it.
pub fn create_response(request: &Request, status: StatusCode) -> Response {
    let mut response = Response::new(status);
    for header in request.headers() {
        match header {
            TypedHeader::Via(_)
            | TypedHeader::From(_)
            | TypedHeader::To(_)
            | TypedHeader::CallId(_)
            | TypedHeader::CSeq(_) => response.headers.push(header.clone()),
            _ => {}
        }
    }
    response
}

/// Create a failure response to `request`
///
/// Non-100 responses get a fresh To tag when the request had none, and the
/// reason phrase can be overridden.
pub fn create_failure_response(
    request: &Request,
    status: StatusCode,
    reason: Option<&str>,
) -> Response {
    let mut response = create_response(request, status);
    if status.as_u16() > 100 && request.to_tag().is_none() {
        response = response.with_to_tag(generate_tag());
    }
    if let Some(reason) = reason {
        response = response.with_reason(reason);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::request_builders::create_test_request;
    use crate::message::Method;

    #[test]
    fn test_create_response_copies_dialog_headers() {
        let request = create_test_request(Method::Invite);
        let response = create_response(&request, StatusCode::OK);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.call_id(), request.call_id());
        assert_eq!(response.cseq(), request.cseq());
        assert_eq!(response.from_tag(), request.from_tag());
        assert_eq!(response.top_via(), request.top_via());
        assert!(response.to_tag().is_none(), "To tag should not be present");
    }

    #[test]
    fn test_failure_response_gets_to_tag_and_reason() {
        let request = create_test_request(Method::Options);
        let response = create_failure_response(&request, StatusCode::BAD_REQUEST, Some("Missing Contact"));

        assert!(response.to_tag().is_some());
        assert_eq!(response.reason_phrase(), "Missing Contact");
    }

    #[test]
    fn test_failure_response_keeps_existing_to_tag() {
        let mut request = create_test_request(Method::Bye);
        for header in request.headers.iter_mut() {
            if let TypedHeader::To(to) = header {
                to.set_tag("remote-set");
            }
        }
        let response = create_failure_response(&request, StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST, None);
        assert_eq!(response.to_tag(), Some("remote-set"));
        assert_eq!(response.reason_phrase(), "Call/Transaction Does Not Exist");
    }
}
