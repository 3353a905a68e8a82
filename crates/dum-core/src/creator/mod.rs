//! Outbound request templates
//!
//! A creator is what a client-side dialog set remembers about the request
//! that started it: the request as last sent, any initial offer, and which
//! kind of usage a matching response should turn into. It lives until the
//! first final response to that request.

use bytes::Bytes;

use crate::message::{Method, Request, Uri};
use crate::usage::UsageKind;

/// What the pending request is trying to establish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorKind {
    InviteSession { target: Uri },
    Subscription { event: String },
    Registration { aor: Uri },
    Publication { event: String },
    OutOfDialog { method: Method },
}

/// Pending initial request of a client dialog set
#[derive(Debug, Clone)]
pub struct BaseCreator {
    kind: CreatorKind,
    last_request: Request,
    initial_offer: Option<Bytes>,
}

impl BaseCreator {
    pub fn new(kind: CreatorKind, request: Request) -> Self {
        Self {
            kind,
            last_request: request,
            initial_offer: None,
        }
    }

    pub fn with_offer(mut self, offer: Option<Bytes>) -> Self {
        self.initial_offer = offer;
        self
    }

    pub fn kind(&self) -> &CreatorKind {
        &self.kind
    }

    /// The request as most recently handed to the stack
    pub fn last_request(&self) -> &Request {
        &self.last_request
    }

    pub fn set_last_request(&mut self, request: Request) {
        self.last_request = request;
    }

    pub fn initial_offer(&self) -> Option<&Bytes> {
        self.initial_offer.as_ref()
    }

    /// Method of the pending request
    pub fn method(&self) -> Method {
        match &self.kind {
            CreatorKind::InviteSession { .. } => Method::Invite,
            CreatorKind::Subscription { .. } => Method::Subscribe,
            CreatorKind::Registration { .. } => Method::Register,
            CreatorKind::Publication { .. } => Method::Publish,
            CreatorKind::OutOfDialog { method } => method.clone(),
        }
    }

    /// Usage a matching response turns into
    pub fn usage_kind(&self) -> UsageKind {
        match &self.kind {
            CreatorKind::InviteSession { .. } => UsageKind::ClientInviteSession,
            CreatorKind::Subscription { .. } => UsageKind::ClientSubscription,
            CreatorKind::Registration { .. } => UsageKind::ClientRegistration,
            CreatorKind::Publication { .. } => UsageKind::ClientPublication,
            CreatorKind::OutOfDialog { .. } => UsageKind::ClientOutOfDialogReq,
        }
    }

    /// Event package or method name used to pick a handler
    pub fn handler_key(&self) -> Option<&str> {
        match &self.kind {
            CreatorKind::Subscription { event } | CreatorKind::Publication { event } => Some(event.as_str()),
            CreatorKind::OutOfDialog { method } => Some(method.as_str()),
            _ => None,
        }
    }

    /// True when a response with this CSeq method can come from the pending request
    pub fn is_response_to(&self, method: &Method) -> bool {
        &self.method() == method
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::request_builders::create_test_request;

    #[test]
    fn test_creator_kind_drives_method_and_usage() {
        let creator = BaseCreator::new(
            CreatorKind::Subscription {
                event: "presence".to_string(),
            },
            create_test_request(Method::Subscribe),
        );
        assert_eq!(creator.method(), Method::Subscribe);
        assert_eq!(creator.usage_kind(), UsageKind::ClientSubscription);
        assert_eq!(creator.handler_key(), Some("presence"));
        assert!(creator.is_response_to(&Method::Subscribe));
        assert!(!creator.is_response_to(&Method::Notify));
        assert!(creator.initial_offer().is_none());
    }
}
