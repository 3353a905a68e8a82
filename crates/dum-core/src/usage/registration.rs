//! Registration usages

use std::any::Any;

use tracing::{debug, info, warn};

use super::{answer, BaseUsage, UsageHandle, UsageKind, UsageOutcome};
use crate::creator::{BaseCreator, CreatorKind};
use crate::dialog::DialogId;
use crate::errors::{DumError, DumResult};
use crate::message::request_builders::create_refresh_request;
use crate::message::{HeaderAccess, Method, Request, SipMessage, StatusCode, TypedHeader, Uri};
use crate::transport::{DumTimer, DumTimerKind, Outbox};

/// A binding we hold at a registrar
#[derive(Debug)]
pub struct ClientRegistration {
    handle: UsageHandle,
    dialog_id: DialogId,
    aor: Uri,
    request: Request,
    registered: bool,
    expires: Option<u32>,
}

impl ClientRegistration {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, creator: &BaseCreator) -> DumResult<Self> {
        let CreatorKind::Registration { aor } = creator.kind() else {
            return Err(DumError::invalid_state(format!(
                "Cannot build a registration from a pending {}",
                creator.method()
            )));
        };
        Ok(Self {
            handle,
            dialog_id,
            aor: aor.clone(),
            request: creator.last_request().clone(),
            registered: false,
            expires: None,
        })
    }

    pub fn aor(&self) -> &Uri {
        &self.aor
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Binding lifetime granted by the registrar
    pub fn expires(&self) -> Option<u32> {
        self.expires
    }

    /// The REGISTER most recently sent
    pub fn last_request(&self) -> &Request {
        &self.request
    }
}

impl BaseUsage for ClientRegistration {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ClientRegistration
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn dispatch(&mut self, message: &SipMessage, _outbox: &mut Outbox) -> UsageOutcome {
        let Some(response) = message.as_response() else {
            debug!("ClientRegistration {} ignoring request", self.handle);
            return UsageOutcome::Continue;
        };

        let status = response.status();
        if status.is_provisional() {
            return UsageOutcome::Continue;
        }
        if status.is_failure() {
            info!("Registration of {} failed: {}", self.aor, status);
            self.registered = false;
            return UsageOutcome::Terminate;
        }

        let expires = response.expires().or_else(|| self.request.expires());
        if expires == Some(0) {
            info!("Registration of {} removed", self.aor);
            self.registered = false;
            return UsageOutcome::Terminate;
        }
        self.expires = expires;
        self.registered = true;
        UsageOutcome::Continue
    }

    fn dispatch_timer(&mut self, timer: &DumTimer, outbox: &mut Outbox) -> UsageOutcome {
        match timer.kind {
            DumTimerKind::SessionExpired => UsageOutcome::Terminate,
            DumTimerKind::Refresh if !self.registered => UsageOutcome::Continue,
            DumTimerKind::Refresh => {
                match create_refresh_request(&self.request) {
                    Ok(refresh) => {
                        self.request = refresh.clone();
                        outbox.push(refresh);
                    }
                    Err(e) => warn!("Unable to refresh registration of {}: {}", self.aor, e),
                }
                UsageOutcome::Continue
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A REGISTER received from a user agent, awaiting the application's answer
#[derive(Debug)]
pub struct ServerRegistration {
    handle: UsageHandle,
    dialog_id: DialogId,
    request: Request,
    answered: bool,
}

impl ServerRegistration {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, request: &Request) -> Self {
        Self {
            handle,
            dialog_id,
            request: request.clone(),
            answered: false,
        }
    }

    /// Address of record being registered (the To URI)
    pub fn aor(&self) -> Option<&Uri> {
        self.request.to().map(|to| &to.uri)
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// True when the REGISTER carried `Expires: 0`
    pub fn is_removal(&self) -> bool {
        self.request.method == Method::Register && self.request.expires() == Some(0)
    }
}

impl BaseUsage for ServerRegistration {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ServerRegistration
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn dispatch(&mut self, message: &SipMessage, _outbox: &mut Outbox) -> UsageOutcome {
        debug!("ServerRegistration {} ignoring {}", self.handle, message.brief());
        UsageOutcome::Continue
    }

    fn respond(&mut self, status: StatusCode, outbox: &mut Outbox) -> DumResult<UsageOutcome> {
        if self.answered {
            return Err(DumError::invalid_state("REGISTER already answered"));
        }
        let mut response = answer(&self.request, status, self.dialog_id.local_tag());
        if status.is_success() {
            if let Some(expires) = self.request.expires() {
                response.set_header(TypedHeader::Expires(expires));
            }
        }
        outbox.push(response);
        if status.is_provisional() {
            return Ok(UsageOutcome::Continue);
        }
        self.answered = true;
        Ok(UsageOutcome::Terminate)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogSetId;
    use crate::message::request_builders::create_test_request;
    use crate::message::response_builders::create_response;

    fn registration() -> (ClientRegistration, Request) {
        let request = create_test_request(Method::Register).with_header(TypedHeader::Expires(3600));
        let creator = BaseCreator::new(
            CreatorKind::Registration {
                aor: "sip:alice@example.com".parse().unwrap(),
            },
            request.clone(),
        );
        let dialog_id = DialogId::new(DialogSetId::from_response(&create_response(&request, StatusCode::OK)).unwrap(), "reg");
        let usage = ClientRegistration::new(UsageHandle::from_raw(3), dialog_id, &creator).unwrap();
        (usage, request)
    }

    #[test]
    fn test_refresh_resends_with_next_cseq() {
        let (mut usage, request) = registration();
        let mut outbox = Outbox::new();

        // Nothing to refresh before the registrar accepted us
        let refresh = DumTimer::new(usage.handle(), DumTimerKind::Refresh);
        usage.dispatch_timer(&refresh, &mut outbox);
        assert!(outbox.is_empty());

        let ok = create_response(&request, StatusCode::OK).with_header(TypedHeader::Expires(600));
        assert_eq!(usage.dispatch(&SipMessage::Response(ok), &mut outbox), UsageOutcome::Continue);
        assert!(usage.is_registered());
        assert_eq!(usage.expires(), Some(600));

        usage.dispatch_timer(&refresh, &mut outbox);
        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].as_request().unwrap().cseq().unwrap().seq, 2);
        assert_eq!(usage.last_request().cseq().unwrap().seq, 2);
    }

    #[test]
    fn test_zero_expiry_ends_registration() {
        let (mut usage, request) = registration();
        let mut outbox = Outbox::new();
        let ok = create_response(&request, StatusCode::OK).with_header(TypedHeader::Expires(0));
        assert_eq!(usage.dispatch(&SipMessage::Response(ok), &mut outbox), UsageOutcome::Terminate);
    }

    #[test]
    fn test_server_registration_answers_once() {
        let request = create_test_request(Method::Register).with_header(TypedHeader::Expires(0));
        let dialog_id = DialogId::from_request(&request).unwrap();
        let mut usage = ServerRegistration::new(UsageHandle::from_raw(4), dialog_id, &request);
        assert!(usage.is_removal());

        let mut outbox = Outbox::new();
        assert_eq!(usage.respond(StatusCode::OK, &mut outbox).unwrap(), UsageOutcome::Terminate);
        assert!(usage.respond(StatusCode::OK, &mut outbox).is_err());
        assert_eq!(outbox.len(), 1);
    }
}
