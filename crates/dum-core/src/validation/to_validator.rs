//! Request target check
//!
//! Asks the profile whether the Request-URI names an identity we serve.
//! [`MasterProfile`](crate::profile::MasterProfile) serves every target;
//! profiles with identity data override [`Profile::accepts_target`].

use tracing::info;

use crate::message::response_builders::create_failure_response;
use crate::message::{Request, Response, StatusCode};
use crate::profile::Profile;

/// Admit `request`, or return the 404 rejecting it
pub fn validate_to_target(profile: &dyn Profile, request: &Request) -> Result<(), Response> {
    if profile.accepts_target(&request.uri) {
        return Ok(());
    }
    info!("Rejecting {}: not responsible for {}", request.brief(), request.uri);
    Err(create_failure_response(request, StatusCode::NOT_FOUND, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::request_builders::create_test_request;
    use crate::message::{Method, MimeType, Uri};
    use crate::profile::MasterProfile;

    #[derive(Debug)]
    struct SingleDomain(MasterProfile);

    impl Profile for SingleDomain {
        fn is_scheme_supported(&self, scheme: &str) -> bool {
            self.0.is_scheme_supported(scheme)
        }
        fn is_method_supported(&self, method: &Method) -> bool {
            self.0.is_method_supported(method)
        }
        fn unsupported_tokens(&self, required: &[String]) -> Vec<String> {
            self.0.unsupported_tokens(required)
        }
        fn is_mime_type_supported(&self, mime_type: &MimeType) -> bool {
            self.0.is_mime_type_supported(mime_type)
        }
        fn is_content_encoding_supported(&self, encoding: &str) -> bool {
            self.0.is_content_encoding_supported(encoding)
        }
        fn is_language_supported(&self, language: &str) -> bool {
            self.0.is_language_supported(language)
        }
        fn allowed_methods(&self) -> Vec<Method> {
            self.0.allowed_methods()
        }
        fn supported_mime_types(&self) -> Vec<MimeType> {
            self.0.supported_mime_types()
        }
        fn supported_encodings(&self) -> Vec<String> {
            self.0.supported_encodings()
        }
        fn supported_languages(&self) -> Vec<String> {
            self.0.supported_languages()
        }
        fn supported_option_tags(&self) -> Vec<String> {
            self.0.supported_option_tags()
        }
        fn accepts_target(&self, target: &Uri) -> bool {
            target.host == "example.net"
        }
    }

    #[test]
    fn test_default_profile_accepts_any_target() {
        let request = create_test_request(Method::Options);
        assert!(validate_to_target(&MasterProfile::default(), &request).is_ok());
    }

    #[test]
    fn test_foreign_target_gets_404() {
        let profile = SingleDomain(MasterProfile::default());
        let mut request = create_test_request(Method::Options);
        assert!(validate_to_target(&profile, &request).is_ok());

        request.uri = Uri::new("sip", "elsewhere.org");
        let response = validate_to_target(&profile, &request).unwrap_err();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
