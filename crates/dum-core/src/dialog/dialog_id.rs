//! Dialog set and dialog identifiers
//!
//! A [`DialogSetId`] names everything that can grow out of one initial
//! request (Call-ID plus our local tag); a [`DialogId`] adds the remote tag
//! and names one dialog inside that set.
//!
//! ## Local tag derivation
//!
//! | message                        | local tag                       | remote tag |
//! |--------------------------------|---------------------------------|------------|
//! | response                       | From tag (we sent the request)  | To tag     |
//! | request with To tag            | To tag                          | From tag   |
//! | request without To tag         | derived from Call-ID + From tag | From tag   |
//!
//! The derived tag is what a server-side dialog set stamps on its responses,
//! so the peer's follow-up requests carry it back as their To tag.
//! Retransmissions, forked copies and CANCELs of an initial request all map
//! to the same set.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DumError, DumResult};
use crate::message::{HeaderAccess, Request, Response, SipMessage};

/// Identifies a dialog set: Call-ID and local tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogSetId {
    call_id: String,
    local_tag: String,
}

impl DialogSetId {
    pub fn new(call_id: impl Into<String>, local_tag: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            local_tag: local_tag.into(),
        }
    }

    /// Derive the id of the dialog set a request belongs to
    pub fn from_request(request: &Request) -> DumResult<Self> {
        let call_id = required_call_id(request)?;
        match request.to_tag() {
            Some(to_tag) => Ok(Self::new(call_id, to_tag)),
            None => {
                let from_tag = required_from_tag(request)?;
                Ok(Self::new(call_id, derive_server_tag(call_id, from_tag)))
            }
        }
    }

    /// Derive the id of the dialog set a response belongs to
    pub fn from_response(response: &Response) -> DumResult<Self> {
        let call_id = required_call_id(response)?;
        let from_tag = required_from_tag(response)?;
        Ok(Self::new(call_id, from_tag))
    }

    /// Id of the client dialog set a request we originate belongs to
    ///
    /// Our From tag is the local tag, exactly as in [`Self::from_response`].
    pub fn from_outbound_request(request: &Request) -> DumResult<Self> {
        let call_id = required_call_id(request)?;
        let from_tag = required_from_tag(request)?;
        Ok(Self::new(call_id, from_tag))
    }

    pub fn from_message(message: &SipMessage) -> DumResult<Self> {
        match message {
            SipMessage::Request(request) => Self::from_request(request),
            SipMessage::Response(response) => Self::from_response(response),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn local_tag(&self) -> &str {
        &self.local_tag
    }
}

impl fmt::Display for DialogSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.call_id, self.local_tag)
    }
}

/// Identifies one dialog: dialog set id plus remote tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId {
    dialog_set_id: DialogSetId,
    remote_tag: String,
}

impl DialogId {
    pub fn new(dialog_set_id: DialogSetId, remote_tag: impl Into<String>) -> Self {
        Self {
            dialog_set_id,
            remote_tag: remote_tag.into(),
        }
    }

    /// Dialog id of a request; the remote tag is the From tag
    pub fn from_request(request: &Request) -> DumResult<Self> {
        let set_id = DialogSetId::from_request(request)?;
        let remote_tag = required_from_tag(request)?;
        Ok(Self::new(set_id, remote_tag))
    }

    /// Dialog id of a response; `None` when the response carries no To tag
    pub fn from_response(response: &Response) -> DumResult<Option<Self>> {
        let set_id = DialogSetId::from_response(response)?;
        Ok(response.to_tag().map(|tag| Self::new(set_id, tag)))
    }

    pub fn dialog_set_id(&self) -> &DialogSetId {
        &self.dialog_set_id
    }

    pub fn call_id(&self) -> &str {
        self.dialog_set_id.call_id()
    }

    pub fn local_tag(&self) -> &str {
        self.dialog_set_id.local_tag()
    }

    pub fn remote_tag(&self) -> &str {
        &self.remote_tag
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dialog_set_id, self.remote_tag)
    }
}

/// Local tag of a server-side dialog set, stable for a given Call-ID and From tag
pub fn derive_server_tag(call_id: &str, from_tag: &str) -> String {
    let name = format!("{}\u{0}{}", call_id, from_tag);
    let mut tag = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
        .simple()
        .to_string();
    tag.truncate(16);
    tag
}

fn required_call_id<M: HeaderAccess + ?Sized>(message: &M) -> DumResult<&str> {
    message
        .call_id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DumError::protocol("Missing Call-ID header"))
}

fn required_from_tag<M: HeaderAccess + ?Sized>(message: &M) -> DumResult<&str> {
    message
        .from_tag()
        .filter(|tag| !tag.is_empty())
        .ok_or_else(|| DumError::protocol("Missing From tag"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::request_builders::{create_cancel, create_test_request};
    use crate::message::response_builders::create_response;
    use crate::message::{Method, StatusCode, TypedHeader};

    #[test]
    fn test_initial_request_and_cancel_share_set_id() {
        let invite = create_test_request(Method::Invite);
        let cancel = create_cancel(&invite).unwrap();

        let invite_id = DialogSetId::from_request(&invite).unwrap();
        assert_eq!(invite_id, DialogSetId::from_request(&cancel).unwrap());
        assert_eq!(invite_id.call_id(), invite.call_id().unwrap());
        assert_ne!(invite_id.local_tag(), invite.from_tag().unwrap());
    }

    #[test]
    fn test_in_dialog_request_uses_to_tag() {
        let invite = create_test_request(Method::Invite);
        let server_set = DialogSetId::from_request(&invite).unwrap();

        // The peer's BYE carries our derived tag back as its To tag
        let mut bye = create_test_request(Method::Bye);
        for header in bye.headers.iter_mut() {
            match header {
                TypedHeader::To(to) => to.set_tag(server_set.local_tag()),
                TypedHeader::From(from) => from.tag = invite.from_tag().map(str::to_string),
                TypedHeader::CallId(id) => *id = invite.call_id().unwrap().to_string(),
                _ => {}
            }
        }

        assert_eq!(DialogSetId::from_request(&bye).unwrap(), server_set);
        let dialog_id = DialogId::from_request(&bye).unwrap();
        assert_eq!(dialog_id.remote_tag(), invite.from_tag().unwrap());
    }

    #[test]
    fn test_response_uses_from_tag_as_local_tag() {
        let request = create_test_request(Method::Invite);
        let trying = create_response(&request, StatusCode::TRYING);
        let set_id = DialogSetId::from_response(&trying).unwrap();

        assert_eq!(set_id.local_tag(), request.from_tag().unwrap());
        assert_eq!(DialogId::from_response(&trying).unwrap(), None);

        let ok = create_response(&request, StatusCode::OK).with_to_tag("bob-tag");
        let dialog_id = DialogId::from_response(&ok).unwrap().unwrap();
        assert_eq!(dialog_id.dialog_set_id(), &set_id);
        assert_eq!(dialog_id.remote_tag(), "bob-tag");
    }

    #[test]
    fn test_missing_call_id_is_protocol_error() {
        let mut request = create_test_request(Method::Options);
        request.headers.retain(|h| !matches!(h, TypedHeader::CallId(_)));
        let err = DialogSetId::from_request(&request).unwrap_err();
        assert!(matches!(err, DumError::Protocol { .. }));
    }

    #[test]
    fn test_derived_tag_is_deterministic() {
        assert_eq!(derive_server_tag("abc", "1"), derive_server_tag("abc", "1"));
        assert_ne!(derive_server_tag("abc", "1"), derive_server_tag("abc", "2"));
        assert_eq!(derive_server_tag("abc", "1").len(), 16);
    }
}
