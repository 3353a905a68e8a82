//! Typed SIP headers
//!
//! Only the headers the dialog usage manager reads or writes are modelled.
//! Everything else travels through as [`TypedHeader::Other`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DumError;
use super::method::Method;
use super::uri::NameAddr;

/// Header names known to this crate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderName {
    Via,
    From,
    To,
    CallId,
    CSeq,
    Contact,
    MaxForwards,
    Require,
    Supported,
    Unsupported,
    Allow,
    Accept,
    AcceptEncoding,
    AcceptLanguage,
    ContentType,
    ContentDisposition,
    ContentEncoding,
    ContentLanguage,
    Event,
    Expires,
    UserAgent,
    Other(String),
}

/// Top-level media type, e.g. `application/sdp`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MimeType {
    pub media_type: String,
    pub subtype: String,
}

impl MimeType {
    pub fn new(media_type: &str, subtype: &str) -> Self {
        Self {
            media_type: media_type.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
        }
    }

    /// `application/sdp`
    pub fn sdp() -> Self {
        Self::new("application", "sdp")
    }

    /// True when `other` is covered by this type, honouring `*` wildcards
    pub fn matches(&self, other: &MimeType) -> bool {
        (self.media_type == "*" || self.media_type == other.media_type)
            && (self.subtype == "*" || self.subtype == other.subtype)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_type, self.subtype)
    }
}

impl FromStr for MimeType {
    type Err = DumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or(s).trim();
        match essence.split_once('/') {
            Some((t, st)) if !t.is_empty() && !st.is_empty() => Ok(MimeType::new(t.trim(), st.trim())),
            _ => Err(DumError::protocol(format!("Invalid media type: {}", s))),
        }
    }
}

impl TryFrom<String> for MimeType {
    type Error = DumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MimeType> for String {
    fn from(mime: MimeType) -> Self {
        mime.to_string()
    }
}

/// Content-Disposition with its `handling` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDisposition {
    pub disposition: String,
    pub handling: Option<String>,
}

impl ContentDisposition {
    pub fn new(disposition: impl Into<String>) -> Self {
        Self {
            disposition: disposition.into(),
            handling: None,
        }
    }

    pub fn with_handling(mut self, handling: impl Into<String>) -> Self {
        self.handling = Some(handling.into());
        self
    }

    /// True for `handling=required` (case-insensitive)
    pub fn is_handling_required(&self) -> bool {
        self.handling
            .as_deref()
            .map(|h| h.eq_ignore_ascii_case("required"))
            .unwrap_or(false)
    }
}

/// A single Via entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via {
    pub transport: String,
    pub sent_by: String,
    pub branch: Option<String>,
}

impl Via {
    pub fn new(transport: impl Into<String>, sent_by: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            sent_by: sent_by.into(),
            branch: Some(branch.into()),
        }
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

/// CSeq header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CSeq {
    pub seq: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(seq: u32, method: Method) -> Self {
        Self { seq, method }
    }
}

/// A parsed header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedHeader {
    Via(Via),
    From(NameAddr),
    To(NameAddr),
    CallId(String),
    CSeq(CSeq),
    Contact(NameAddr),
    MaxForwards(u32),
    Require(Vec<String>),
    Supported(Vec<String>),
    Unsupported(Vec<String>),
    Allow(Vec<Method>),
    Accept(Vec<MimeType>),
    AcceptEncoding(Vec<String>),
    AcceptLanguage(Vec<String>),
    ContentType(MimeType),
    ContentDisposition(ContentDisposition),
    ContentEncoding(Vec<String>),
    ContentLanguage(Vec<String>),
    Event(String),
    Expires(u32),
    UserAgent(String),
    Other { name: String, value: String },
}

impl TypedHeader {
    pub fn name(&self) -> HeaderName {
        match self {
            TypedHeader::Via(_) => HeaderName::Via,
            TypedHeader::From(_) => HeaderName::From,
            TypedHeader::To(_) => HeaderName::To,
            TypedHeader::CallId(_) => HeaderName::CallId,
            TypedHeader::CSeq(_) => HeaderName::CSeq,
            TypedHeader::Contact(_) => HeaderName::Contact,
            TypedHeader::MaxForwards(_) => HeaderName::MaxForwards,
            TypedHeader::Require(_) => HeaderName::Require,
            TypedHeader::Supported(_) => HeaderName::Supported,
            TypedHeader::Unsupported(_) => HeaderName::Unsupported,
            TypedHeader::Allow(_) => HeaderName::Allow,
            TypedHeader::Accept(_) => HeaderName::Accept,
            TypedHeader::AcceptEncoding(_) => HeaderName::AcceptEncoding,
            TypedHeader::AcceptLanguage(_) => HeaderName::AcceptLanguage,
            TypedHeader::ContentType(_) => HeaderName::ContentType,
            TypedHeader::ContentDisposition(_) => HeaderName::ContentDisposition,
            TypedHeader::ContentEncoding(_) => HeaderName::ContentEncoding,
            TypedHeader::ContentLanguage(_) => HeaderName::ContentLanguage,
            TypedHeader::Event(_) => HeaderName::Event,
            TypedHeader::Expires(_) => HeaderName::Expires,
            TypedHeader::UserAgent(_) => HeaderName::UserAgent,
            TypedHeader::Other { name, .. } => HeaderName::Other(name.clone()),
        }
    }
}

/// Typed read access shared by requests and responses
pub trait HeaderAccess {
    fn headers(&self) -> &[TypedHeader];

    fn headers_mut(&mut self) -> &mut Vec<TypedHeader>;

    /// First header with the given name
    fn header(&self, name: &HeaderName) -> Option<&TypedHeader> {
        self.headers().iter().find(|h| &h.name() == name)
    }

    fn has_header(&self, name: &HeaderName) -> bool {
        self.header(name).is_some()
    }

    /// Replace every header of this kind with `header`
    fn set_header(&mut self, header: TypedHeader) {
        let name = header.name();
        let headers = self.headers_mut();
        headers.retain(|h| h.name() != name);
        headers.push(header);
    }

    fn from(&self) -> Option<&NameAddr> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::From(addr) => Some(addr),
            _ => None,
        })
    }

    fn to(&self) -> Option<&NameAddr> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::To(addr) => Some(addr),
            _ => None,
        })
    }

    fn from_tag(&self) -> Option<&str> {
        HeaderAccess::from(self).and_then(|f| f.tag())
    }

    fn to_tag(&self) -> Option<&str> {
        self.to().and_then(|t| t.tag())
    }

    fn call_id(&self) -> Option<&str> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::CallId(id) => Some(id.as_str()),
            _ => None,
        })
    }

    fn cseq(&self) -> Option<&CSeq> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::CSeq(cseq) => Some(cseq),
            _ => None,
        })
    }

    /// Topmost Via
    fn top_via(&self) -> Option<&Via> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::Via(via) => Some(via),
            _ => None,
        })
    }

    fn contact(&self) -> Option<&NameAddr> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::Contact(addr) => Some(addr),
            _ => None,
        })
    }

    /// All Require option tags across every Require header
    fn requires(&self) -> Vec<String> {
        self.headers()
            .iter()
            .filter_map(|h| match h {
                TypedHeader::Require(tags) => Some(tags.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn unsupported(&self) -> Vec<String> {
        self.headers()
            .iter()
            .filter_map(|h| match h {
                TypedHeader::Unsupported(tags) => Some(tags.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn allow(&self) -> Vec<Method> {
        self.headers()
            .iter()
            .filter_map(|h| match h {
                TypedHeader::Allow(methods) => Some(methods.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn content_type(&self) -> Option<&MimeType> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::ContentType(mime) => Some(mime),
            _ => None,
        })
    }

    fn content_disposition(&self) -> Option<&ContentDisposition> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::ContentDisposition(cd) => Some(cd),
            _ => None,
        })
    }

    fn content_encodings(&self) -> Vec<String> {
        self.headers()
            .iter()
            .filter_map(|h| match h {
                TypedHeader::ContentEncoding(codings) => Some(codings.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn content_languages(&self) -> Vec<String> {
        self.headers()
            .iter()
            .filter_map(|h| match h {
                TypedHeader::ContentLanguage(langs) => Some(langs.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn event(&self) -> Option<&str> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::Event(event) => Some(event.as_str()),
            _ => None,
        })
    }

    /// Value of an untyped header, matched case-insensitively
    fn other_header(&self, name: &str) -> Option<&str> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::Other { name: n, value } if n.eq_ignore_ascii_case(name) => Some(value.as_str()),
            _ => None,
        })
    }

    fn expires(&self) -> Option<u32> {
        self.headers().iter().find_map(|h| match h {
            TypedHeader::Expires(secs) => Some(*secs),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_wildcards() {
        let any_app: MimeType = "application/*".parse().unwrap();
        assert!(any_app.matches(&MimeType::sdp()));
        assert!(!MimeType::sdp().matches(&"text/plain".parse().unwrap()));
        assert_eq!("Application/SDP; charset=x".parse::<MimeType>().unwrap(), MimeType::sdp());
        assert!("sdp".parse::<MimeType>().is_err());
    }

    #[test]
    fn test_handling_required_is_case_insensitive() {
        let cd = ContentDisposition::new("session").with_handling("REQUIRED");
        assert!(cd.is_handling_required());
        assert!(!ContentDisposition::new("session").with_handling("optional").is_handling_required());
        assert!(!ContentDisposition::new("render").is_handling_required());
    }
}
