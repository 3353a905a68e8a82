//! Admission of inbound requests: capability checks, merge detection and
//! server authentication, each answered with exactly one response

mod common;

use std::sync::Arc;

use common::*;
use rvoip_dum_core::message::{ContentDisposition, HeaderAccess, HeaderName, MimeType, TypedHeader, Via};
use rvoip_dum_core::{MasterProfile, Method, Request, Response, ServerAuthManager, StatusCode, Uri};
use rvoip_dum_core::message::response_builders::create_failure_response;

#[tokio::test]
async fn test_unsupported_scheme_gets_416() {
    let mut t = TestDum::new();
    let mut request = inbound(Method::Options);
    request.uri = Uri::new("tel", "+15551234");

    let sent = t.deliver_request(request).await;
    assert_eq!(single_response(&sent).status(), StatusCode::UNSUPPORTED_URI_SCHEME);
    assert_eq!(t.dum.dialog_set_count(), 0);
    assert_eq!(t.dum.usage_count(), 0);
}

#[tokio::test]
async fn test_unsupported_method_gets_405_with_allow() {
    let mut t = TestDum::new();
    let mut profile = MasterProfile::default();
    profile.remove_supported_method(&Method::Message);
    t.dum.set_profile(Arc::new(profile.clone()));

    let sent = t.deliver_request(inbound(Method::Message)).await;
    let response = single_response(&sent);
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.allow(), profile.methods);
    assert!(!response.allow().contains(&Method::Message));
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_unknown_option_tags_get_420_listing_exactly_them() {
    let mut t = TestDum::new();
    let request = inbound(Method::Invite).with_header(TypedHeader::Require(vec![
        "100rel".to_string(),
        "timer".to_string(),
        "gruu".to_string(),
    ]));

    let sent = t.deliver_request(request).await;
    let response = single_response(&sent);
    assert_eq!(response.status(), StatusCode::BAD_EXTENSION);
    assert_eq!(response.unsupported(), vec!["100rel".to_string(), "gruu".to_string()]);
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_required_body_in_unknown_type_gets_415_with_accept() {
    let mut t = TestDum::new();
    let request = inbound(Method::Invite)
        .with_header(TypedHeader::ContentType(MimeType::new("application", "vnd.example")))
        .with_header(TypedHeader::ContentDisposition(
            ContentDisposition::new("session").with_handling("required"),
        ))
        .with_body("opaque");

    let sent = t.deliver_request(request).await;
    let response = single_response(&sent);
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(response.has_header(&HeaderName::Accept));
    assert!(!response.has_header(&HeaderName::AcceptEncoding));
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_required_body_in_unknown_language_gets_415_with_accept_language() {
    let mut t = TestDum::new();
    let request = inbound(Method::Message)
        .with_header(TypedHeader::ContentType(MimeType::new("text", "plain")))
        .with_header(TypedHeader::ContentDisposition(
            ContentDisposition::new("render").with_handling("required"),
        ))
        .with_header(TypedHeader::ContentLanguage(vec!["de".to_string()]))
        .with_body("Hallo");

    let sent = t.deliver_request(request).await;
    let response = single_response(&sent);
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(response.has_header(&HeaderName::AcceptLanguage));
}

#[tokio::test]
async fn test_inadmissible_ack_is_dropped_silently() {
    let mut t = TestDum::new();
    let mut ack = inbound(Method::Ack);
    ack.uri = Uri::new("tel", "+15551234");

    let sent = t.deliver_request(ack).await;
    assert!(sent.is_empty());
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_forked_copy_of_initial_request_gets_482() {
    let mut t = TestDum::new();
    let invite = inbound(Method::Invite);
    assert!(t.deliver_request(invite.clone()).await.is_empty());
    assert_eq!(t.dum.dialog_set_count(), 1);

    let mut forked = invite.clone();
    forked.set_header(TypedHeader::Via(Via::new("UDP", "proxy-b.example.com", "z9hG4bKforkedcopy")));
    let sent = t.deliver_request(forked).await;
    assert_eq!(single_response(&sent).status(), StatusCode::LOOP_DETECTED);

    // The original transaction is untouched
    assert_eq!(t.dum.dialog_set_count(), 1);
    assert_eq!(t.dum.usage_count(), 1);
}

struct DenyAll {
    challenge: bool,
}

impl ServerAuthManager for DenyAll {
    fn handle(&mut self, _request: &Request) -> bool {
        false
    }

    fn challenge(&mut self, request: &Request) -> Option<Response> {
        self.challenge
            .then(|| create_failure_response(request, StatusCode::UNAUTHORIZED, None))
    }
}

#[tokio::test]
async fn test_server_auth_challenge_is_the_only_response() {
    let mut t = TestDum::new();
    t.dum.set_server_auth_manager(Box::new(DenyAll { challenge: true }));

    let sent = t.deliver_request(inbound(Method::Invite)).await;
    assert_eq!(single_response(&sent).status(), StatusCode::UNAUTHORIZED);
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_server_auth_may_swallow_requests() {
    let mut t = TestDum::new();
    t.dum.set_server_auth_manager(Box::new(DenyAll { challenge: false }));

    assert!(t.deliver_request(inbound(Method::Options)).await.is_empty());
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_validation_runs_before_server_auth() {
    let mut t = TestDum::new();
    t.dum.set_server_auth_manager(Box::new(DenyAll { challenge: true }));
    let mut request = inbound(Method::Options);
    request.uri = Uri::new("tel", "+15551234");

    let sent = t.deliver_request(request).await;
    assert_eq!(single_response(&sent).status(), StatusCode::UNSUPPORTED_URI_SCHEME);
}
