//! SIP response message

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::headers::{HeaderAccess, TypedHeader};
use super::status::StatusCode;

/// A SIP response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    /// Reason phrase overriding the status code default
    pub reason: Option<String>,
    pub headers: Vec<TypedHeader>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, header: TypedHeader) -> Self {
        self.headers.push(header);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason_phrase(&self) -> &str {
        self.reason.as_deref().unwrap_or_else(|| self.status.reason_phrase())
    }

    /// Sets the To tag, keeping an existing one
    pub fn with_to_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        for header in self.headers.iter_mut() {
            if let TypedHeader::To(to) = header {
                if to.tag.is_none() {
                    to.set_tag(tag.clone());
                }
            }
        }
        self
    }

    /// One-line summary for logging
    pub fn brief(&self) -> String {
        format!(
            "{} {} call-id={} cseq={}",
            self.status.as_u16(),
            self.reason_phrase(),
            self.call_id().unwrap_or("-"),
            self.cseq()
                .map(|c| format!("{} {}", c.seq, c.method))
                .unwrap_or_else(|| "-".to_string())
        )
    }
}

impl HeaderAccess for Response {
    fn headers(&self) -> &[TypedHeader] {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Vec<TypedHeader> {
        &mut self.headers
    }
}
