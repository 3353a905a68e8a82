//! Structured SIP messages
//!
//! The transaction layer below hands the dialog usage manager messages that
//! are already parsed. This module is that parsed form plus the small set of
//! builders the manager needs to answer, cancel and refresh requests.

pub mod headers;
pub mod method;
pub mod request;
pub mod request_builders;
pub mod response;
pub mod response_builders;
pub mod status;
pub mod uri;

pub use headers::{CSeq, ContentDisposition, HeaderAccess, HeaderName, MimeType, TypedHeader, Via};
pub use method::Method;
pub use request::Request;
pub use response::Response;
pub use status::StatusCode;
pub use uri::{NameAddr, Uri};

use serde::{Deserialize, Serialize};

/// A SIP request or response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SipMessage {
    Request(Request),
    Response(Response),
}

impl SipMessage {
    pub fn is_request(&self) -> bool {
        matches!(self, SipMessage::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, SipMessage::Response(_))
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            SipMessage::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            SipMessage::Response(response) => Some(response),
            _ => None,
        }
    }

    pub fn brief(&self) -> String {
        match self {
            SipMessage::Request(request) => request.brief(),
            SipMessage::Response(response) => response.brief(),
        }
    }
}

impl HeaderAccess for SipMessage {
    fn headers(&self) -> &[TypedHeader] {
        match self {
            SipMessage::Request(request) => &request.headers,
            SipMessage::Response(response) => &response.headers,
        }
    }

    fn headers_mut(&mut self) -> &mut Vec<TypedHeader> {
        match self {
            SipMessage::Request(request) => &mut request.headers,
            SipMessage::Response(response) => &mut response.headers,
        }
    }
}

impl From<Request> for SipMessage {
    fn from(request: Request) -> Self {
        SipMessage::Request(request)
    }
}

impl From<Response> for SipMessage {
    fn from(response: Response) -> Self {
        SipMessage::Response(response)
    }
}
