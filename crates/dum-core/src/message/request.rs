//! SIP request message

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::headers::{HeaderAccess, TypedHeader};
use super::method::Method;
use super::uri::Uri;

/// A SIP request as delivered by the transaction layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The method of the request
    pub method: Method,
    /// The request URI
    pub uri: Uri,
    /// The headers of the request
    pub headers: Vec<TypedHeader>,
    /// The body of the request
    pub body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, header: TypedHeader) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// One-line summary for logging
    pub fn brief(&self) -> String {
        format!(
            "{} {} call-id={} cseq={}",
            self.method,
            self.uri,
            self.call_id().unwrap_or("-"),
            self.cseq().map(|c| c.seq).unwrap_or(0)
        )
    }
}

impl HeaderAccess for Request {
    fn headers(&self) -> &[TypedHeader] {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Vec<TypedHeader> {
        &mut self.headers
    }
}
