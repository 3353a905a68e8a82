//! Capability checks against the profile
//!
//! The stages run in order and stop at the first failure:
//!
//! 1. URI scheme → 416
//! 2. method → 405 with `Allow`
//! 3. `Require` option tags → 420 with `Unsupported`
//! 4. when `Content-Disposition` demands `handling=required`: content type,
//!    then content encoding, then content language → 415 with `Accept`,
//!    `Accept-Encoding` or `Accept-Language` respectively

use tracing::info;

use crate::message::response_builders::create_failure_response;
use crate::message::{HeaderAccess, Request, Response, StatusCode, TypedHeader};
use crate::profile::Profile;

/// Admit `request`, or return the one response rejecting it
pub fn validate_request(profile: &dyn Profile, request: &Request) -> Result<(), Response> {
    if !profile.is_scheme_supported(&request.uri.scheme) {
        info!("Rejecting {}: unsupported scheme {}", request.brief(), request.uri.scheme);
        return Err(create_failure_response(request, StatusCode::UNSUPPORTED_URI_SCHEME, None));
    }

    if !profile.is_method_supported(&request.method) {
        info!("Rejecting {}: method not allowed", request.brief());
        let mut response = create_failure_response(request, StatusCode::METHOD_NOT_ALLOWED, None);
        response.set_header(TypedHeader::Allow(profile.allowed_methods()));
        return Err(response);
    }

    let unsupported = profile.unsupported_tokens(&request.requires());
    if !unsupported.is_empty() {
        info!("Rejecting {}: unsupported option tags {:?}", request.brief(), unsupported);
        let mut response = create_failure_response(request, StatusCode::BAD_EXTENSION, None);
        response.set_header(TypedHeader::Unsupported(unsupported));
        return Err(response);
    }

    let handling_required = request
        .content_disposition()
        .map(|cd| cd.is_handling_required())
        .unwrap_or(false);
    if handling_required {
        validate_content(profile, request)?;
    }

    Ok(())
}

fn validate_content(profile: &dyn Profile, request: &Request) -> Result<(), Response> {
    if let Some(mime_type) = request.content_type() {
        if !profile.is_mime_type_supported(mime_type) {
            info!("Rejecting {}: unsupported content type {}", request.brief(), mime_type);
            let mut response = create_failure_response(request, StatusCode::UNSUPPORTED_MEDIA_TYPE, None);
            response.set_header(TypedHeader::Accept(profile.supported_mime_types()));
            return Err(response);
        }
    }

    if let Some(encoding) = request
        .content_encodings()
        .into_iter()
        .find(|e| !profile.is_content_encoding_supported(e))
    {
        info!("Rejecting {}: unsupported content encoding {}", request.brief(), encoding);
        let mut response = create_failure_response(request, StatusCode::UNSUPPORTED_MEDIA_TYPE, None);
        response.set_header(TypedHeader::AcceptEncoding(profile.supported_encodings()));
        return Err(response);
    }

    if let Some(language) = request
        .content_languages()
        .into_iter()
        .find(|l| !profile.is_language_supported(l))
    {
        info!("Rejecting {}: unsupported content language {}", request.brief(), language);
        let mut response = create_failure_response(request, StatusCode::UNSUPPORTED_MEDIA_TYPE, None);
        response.set_header(TypedHeader::AcceptLanguage(profile.supported_languages()));
        return Err(response);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::request_builders::create_test_request;
    use crate::message::{ContentDisposition, Method, MimeType, Uri};
    use crate::profile::MasterProfile;

    fn required_content(request: Request) -> Request {
        request.with_header(TypedHeader::ContentDisposition(
            ContentDisposition::new("session").with_handling("Required"),
        ))
    }

    #[test]
    fn test_scheme_checked_before_method() {
        let profile = MasterProfile::default();
        let mut request = create_test_request(Method::Extension("FOO".into()));
        request.uri = Uri::new("tel", "+15551234");

        let response = validate_request(&profile, &request).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_URI_SCHEME);
    }

    #[test]
    fn test_405_lists_allowed_methods() {
        let mut profile = MasterProfile::default();
        profile.remove_supported_method(&Method::Message);
        let request = create_test_request(Method::Message);

        let response = validate_request(&profile, &request).unwrap_err();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.allow(), profile.allowed_methods());
    }

    #[test]
    fn test_420_lists_only_unsupported_tags() {
        let profile = MasterProfile::default();
        let request = create_test_request(Method::Invite)
            .with_header(TypedHeader::Require(vec!["timer".into(), "100rel".into()]));

        let response = validate_request(&profile, &request).unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_EXTENSION);
        assert_eq!(response.unsupported(), vec!["100rel".to_string()]);
    }

    #[test]
    fn test_content_checks_only_when_handling_required() {
        let profile = MasterProfile::default();
        let html = TypedHeader::ContentType(MimeType::new("text", "html"));

        let optional = create_test_request(Method::Invite).with_header(html.clone());
        assert!(validate_request(&profile, &optional).is_ok());

        let required = required_content(create_test_request(Method::Invite).with_header(html));
        let response = validate_request(&profile, &required).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(response.has_header(&crate::message::HeaderName::Accept));
    }

    #[test]
    fn test_encoding_and_language_short_circuit_separately() {
        let profile = MasterProfile::default();

        let gzip = required_content(create_test_request(Method::Invite))
            .with_header(TypedHeader::ContentType(MimeType::sdp()))
            .with_header(TypedHeader::ContentEncoding(vec!["gzip".into()]))
            .with_header(TypedHeader::ContentLanguage(vec!["fr".into()]));
        let response = validate_request(&profile, &gzip).unwrap_err();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(response.has_header(&crate::message::HeaderName::AcceptEncoding));
        assert!(!response.has_header(&crate::message::HeaderName::AcceptLanguage));

        let french = required_content(create_test_request(Method::Invite))
            .with_header(TypedHeader::ContentLanguage(vec!["fr".into()]));
        let response = validate_request(&profile, &french).unwrap_err();
        assert!(response.has_header(&crate::message::HeaderName::AcceptLanguage));

        let english = required_content(create_test_request(Method::Invite))
            .with_header(TypedHeader::ContentLanguage(vec!["en-US".into()]));
        assert!(validate_request(&profile, &english).is_ok());
    }
}
