//! SIP request creation utilities

use uuid::Uuid;

use super::headers::{CSeq, HeaderAccess, TypedHeader, Via};
use super::method::Method;
use super::request::Request;
use super::response::Response;
use super::response_builders::generate_tag;
use super::uri::{NameAddr, Uri};
use crate::errors::{DumError, DumResult};

/// RFC 3261 magic cookie prefix for Via branches
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// Generate a fresh RFC 3261 compliant Via branch
pub fn generate_branch() -> String {
    format!("{}{}", BRANCH_MAGIC_COOKIE, &Uuid::new_v4().simple().to_string()[..16])
}

/// Generate a globally unique Call-ID
pub fn generate_call_id(host: &str) -> String {
    format!("{}@{}", Uuid::new_v4().simple(), host)
}

/// Create a dialog-initiating request
///
/// The request gets a new Call-ID, a From tag, a Via branch and CSeq 1.
pub fn create_initial_request(method: Method, target: Uri, from: NameAddr, to: NameAddr) -> Request {
    let from = if from.tag.is_none() {
        from.with_tag(generate_tag())
    } else {
        from
    };
    let call_id = generate_call_id(&from.uri.host);
    let via = Via::new("UDP", from.uri.host.clone(), generate_branch());

    Request::new(method.clone(), target)
        .with_header(TypedHeader::Via(via))
        .with_header(TypedHeader::MaxForwards(70))
        .with_header(TypedHeader::From(from))
        .with_header(TypedHeader::To(to))
        .with_header(TypedHeader::CallId(call_id))
        .with_header(TypedHeader::CSeq(CSeq::new(1, method)))
}

/// Create the next request of the same kind from a previously sent one
///
/// Used for registration and subscription refreshes: CSeq is incremented,
/// the Via branch regenerated, and everything else (tags included) kept.
pub fn create_refresh_request(previous: &Request) -> DumResult<Request> {
    let cseq = previous
        .cseq()
        .ok_or_else(|| DumError::protocol("Cannot refresh a request without CSeq"))?;
    let seq = cseq
        .seq
        .checked_add(1)
        .ok_or_else(|| DumError::protocol(format!("CSeq {} cannot be incremented", cseq.seq)))?;
    let next = CSeq::new(seq, cseq.method.clone());

    let mut request = previous.clone();
    for header in request.headers.iter_mut() {
        match header {
            TypedHeader::CSeq(c) => *c = next.clone(),
            TypedHeader::Via(via) => via.branch = Some(generate_branch()),
            _ => {}
        }
    }
    Ok(request)
}

/// Create a CANCEL for a pending INVITE (RFC 3261 Section 9.1)
///
/// The CANCEL reuses the Request-URI, Call-ID, From, To, CSeq number and
/// top Via (same branch) of the INVITE.
pub fn create_cancel(invite: &Request) -> DumResult<Request> {
    if invite.method != Method::Invite {
        return Err(DumError::invalid_state(format!(
            "Only INVITE can be cancelled, not {}",
            invite.method
        )));
    }
    let cseq = invite
        .cseq()
        .ok_or_else(|| DumError::protocol("INVITE missing CSeq header"))?;
    let via = invite
        .top_via()
        .ok_or_else(|| DumError::protocol("INVITE missing Via header"))?;
    let from = HeaderAccess::from(invite)
        .ok_or_else(|| DumError::protocol("INVITE missing From header"))?;
    let to = invite
        .to()
        .ok_or_else(|| DumError::protocol("INVITE missing To header"))?;
    let call_id = invite
        .call_id()
        .ok_or_else(|| DumError::protocol("INVITE missing Call-ID header"))?;

    Ok(Request::new(Method::Cancel, invite.uri.clone())
        .with_header(TypedHeader::Via(via.clone()))
        .with_header(TypedHeader::MaxForwards(70))
        .with_header(TypedHeader::From(from.clone()))
        .with_header(TypedHeader::To(to.clone()))
        .with_header(TypedHeader::CallId(call_id.to_string()))
        .with_header(TypedHeader::CSeq(CSeq::new(cseq.seq, Method::Cancel))))
}

/// Create the ACK for a 2xx response to an INVITE
///
/// A 2xx ACK is its own transaction: it gets a new branch, is sent to the
/// remote target from the response's Contact, and takes its To (with the
/// remote tag) from the response.
pub fn create_ack(invite: &Request, response: &Response) -> DumResult<Request> {
    let cseq = invite
        .cseq()
        .ok_or_else(|| DumError::protocol("INVITE missing CSeq header"))?;
    let from = HeaderAccess::from(invite)
        .ok_or_else(|| DumError::protocol("INVITE missing From header"))?;
    let to = response
        .to()
        .ok_or_else(|| DumError::protocol("Response missing To header"))?;
    let call_id = invite
        .call_id()
        .ok_or_else(|| DumError::protocol("INVITE missing Call-ID header"))?;
    let via = invite
        .top_via()
        .ok_or_else(|| DumError::protocol("INVITE missing Via header"))?;

    let target = response
        .contact()
        .map(|contact| contact.uri.clone())
        .unwrap_or_else(|| invite.uri.clone());

    Ok(Request::new(Method::Ack, target)
        .with_header(TypedHeader::Via(Via::new(
            via.transport.clone(),
            via.sent_by.clone(),
            generate_branch(),
        )))
        .with_header(TypedHeader::MaxForwards(70))
        .with_header(TypedHeader::From(from.clone()))
        .with_header(TypedHeader::To(to.clone()))
        .with_header(TypedHeader::CallId(call_id.to_string()))
        .with_header(TypedHeader::CSeq(CSeq::new(cseq.seq, Method::Ack))))
}

/// Create a test SIP request with the specified method
pub fn create_test_request(method: Method) -> Request {
    let from = NameAddr::new(Uri::new("sip", "example.com").with_user("alice"));
    let to = NameAddr::new(Uri::new("sip", "example.net").with_user("bob"));
    create_initial_request(method, Uri::new("sip", "example.net").with_user("bob"), from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_request_headers() {
        let request = create_test_request(Method::Invite);
        assert!(request.from_tag().is_some());
        assert!(request.to_tag().is_none());
        assert!(request.call_id().unwrap().ends_with("@example.com"));
        assert_eq!(request.cseq(), Some(&CSeq::new(1, Method::Invite)));
        assert!(request.top_via().unwrap().branch().unwrap().starts_with(BRANCH_MAGIC_COOKIE));
    }

    #[test]
    fn test_refresh_bumps_cseq_and_branch() {
        let request = create_test_request(Method::Register);
        let refreshed = create_refresh_request(&request).unwrap();
        assert_eq!(refreshed.cseq().unwrap().seq, 2);
        assert_eq!(refreshed.from_tag(), request.from_tag());
        assert_eq!(refreshed.call_id(), request.call_id());
        assert_ne!(refreshed.top_via(), request.top_via());
    }

    #[test]
    fn test_refresh_refuses_exhausted_cseq() {
        let mut request = create_test_request(Method::Register);
        request.set_header(TypedHeader::CSeq(CSeq::new(u32::MAX, Method::Register)));
        assert!(matches!(create_refresh_request(&request), Err(DumError::Protocol { .. })));
    }

    #[test]
    fn test_cancel_matches_invite_transaction() {
        let invite = create_test_request(Method::Invite);
        let cancel = create_cancel(&invite).unwrap();
        assert_eq!(cancel.method, Method::Cancel);
        assert_eq!(cancel.top_via(), invite.top_via());
        assert_eq!(cancel.cseq(), Some(&CSeq::new(1, Method::Cancel)));
        assert_eq!(cancel.call_id(), invite.call_id());

        let options = create_test_request(Method::Options);
        assert!(create_cancel(&options).is_err());
    }

    #[test]
    fn test_ack_targets_contact_with_new_branch() {
        use crate::message::response_builders::create_response;
        use crate::message::StatusCode;

        let invite = create_test_request(Method::Invite);
        let contact: Uri = "sip:bob@192.0.2.4:5062".parse().unwrap();
        let ok = create_response(&invite, StatusCode::OK)
            .with_to_tag("bob-tag")
            .with_header(TypedHeader::Contact(NameAddr::new(contact.clone())));

        let ack = create_ack(&invite, &ok).unwrap();
        assert_eq!(ack.uri, contact);
        assert_eq!(ack.to_tag(), Some("bob-tag"));
        assert_eq!(ack.cseq(), Some(&CSeq::new(1, Method::Ack)));
        assert_ne!(ack.top_via(), invite.top_via());
    }
}
