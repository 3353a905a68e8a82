//! Capability profiles
//!
//! A [`Profile`] answers the capability questions the request validator asks
//! and supplies the lists attached to rejection responses and to outbound
//! initial requests. [`MasterProfile`] is the configurable default.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::{Method, MimeType, Uri};

/// What this user agent supports
pub trait Profile: Send + Sync + fmt::Debug {
    fn is_scheme_supported(&self, scheme: &str) -> bool;

    fn is_method_supported(&self, method: &Method) -> bool;

    /// The subset of `required` option tags we do not support
    fn unsupported_tokens(&self, required: &[String]) -> Vec<String>;

    fn is_mime_type_supported(&self, mime_type: &MimeType) -> bool;

    fn is_content_encoding_supported(&self, encoding: &str) -> bool;

    fn is_language_supported(&self, language: &str) -> bool;

    fn allowed_methods(&self) -> Vec<Method>;

    fn supported_mime_types(&self) -> Vec<MimeType>;

    fn supported_encodings(&self) -> Vec<String>;

    fn supported_languages(&self) -> Vec<String>;

    fn supported_option_tags(&self) -> Vec<String>;

    /// Whether requests addressed to `target` are ours to handle
    fn accepts_target(&self, _target: &Uri) -> bool {
        true
    }
}

/// Default, serde-configurable profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterProfile {
    pub schemes: Vec<String>,
    pub methods: Vec<Method>,
    pub option_tags: Vec<String>,
    pub mime_types: Vec<MimeType>,
    pub encodings: Vec<String>,
    pub languages: Vec<String>,
}

impl Default for MasterProfile {
    fn default() -> Self {
        Self {
            schemes: vec!["sip".to_string(), "sips".to_string()],
            methods: Method::standard(),
            option_tags: vec!["replaces".to_string(), "timer".to_string()],
            mime_types: vec![MimeType::sdp(), MimeType::new("text", "plain")],
            encodings: vec!["identity".to_string()],
            languages: vec!["en".to_string()],
        }
    }
}

impl MasterProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_supported_scheme(&mut self, scheme: &str) {
        let scheme = scheme.to_ascii_lowercase();
        if !self.schemes.contains(&scheme) {
            self.schemes.push(scheme);
        }
    }

    pub fn add_supported_method(&mut self, method: Method) {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
    }

    pub fn remove_supported_method(&mut self, method: &Method) {
        self.methods.retain(|m| m != method);
    }

    pub fn add_supported_option_tag(&mut self, tag: &str) {
        if !contains_ignore_case(&self.option_tags, tag) {
            self.option_tags.push(tag.to_string());
        }
    }

    pub fn add_supported_mime_type(&mut self, mime_type: MimeType) {
        if !self.mime_types.contains(&mime_type) {
            self.mime_types.push(mime_type);
        }
    }

    pub fn add_supported_encoding(&mut self, encoding: &str) {
        if !contains_ignore_case(&self.encodings, encoding) {
            self.encodings.push(encoding.to_string());
        }
    }

    pub fn add_supported_language(&mut self, language: &str) {
        if !contains_ignore_case(&self.languages, language) {
            self.languages.push(language.to_string());
        }
    }
}

fn contains_ignore_case(list: &[String], token: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(token))
}

impl Profile for MasterProfile {
    fn is_scheme_supported(&self, scheme: &str) -> bool {
        contains_ignore_case(&self.schemes, scheme)
    }

    fn is_method_supported(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    fn unsupported_tokens(&self, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|tag| !contains_ignore_case(&self.option_tags, tag))
            .cloned()
            .collect()
    }

    fn is_mime_type_supported(&self, mime_type: &MimeType) -> bool {
        self.mime_types.iter().any(|supported| supported.matches(mime_type))
    }

    fn is_content_encoding_supported(&self, encoding: &str) -> bool {
        contains_ignore_case(&self.encodings, encoding)
    }

    fn is_language_supported(&self, language: &str) -> bool {
        // "en" covers "en-US"
        self.languages.iter().any(|supported| {
            supported.eq_ignore_ascii_case(language)
                || language
                    .split('-')
                    .next()
                    .map(|primary| primary.eq_ignore_ascii_case(supported))
                    .unwrap_or(false)
        })
    }

    fn allowed_methods(&self) -> Vec<Method> {
        self.methods.clone()
    }

    fn supported_mime_types(&self) -> Vec<MimeType> {
        self.mime_types.clone()
    }

    fn supported_encodings(&self) -> Vec<String> {
        self.encodings.clone()
    }

    fn supported_languages(&self) -> Vec<String> {
        self.languages.clone()
    }

    fn supported_option_tags(&self) -> Vec<String> {
        self.option_tags.clone()
    }
}
