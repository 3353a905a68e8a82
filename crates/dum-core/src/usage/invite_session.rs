//! Client and server INVITE sessions

use std::any::Any;

use bytes::Bytes;
use tracing::{debug, warn};

use super::{answer, BaseUsage, UsageHandle, UsageKind, UsageOutcome};
use crate::creator::{BaseCreator, CreatorKind};
use crate::dialog::DialogId;
use crate::errors::{DumError, DumResult};
use crate::message::request_builders::create_ack;
use crate::message::{HeaderAccess, Method, Request, Response, SipMessage, StatusCode};
use crate::transport::Outbox;

/// State of an INVITE session as seen from either side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteSessionState {
    /// Server side, INVITE received and not yet answered
    Proceeding,
    /// Client side, provisional response with a tag received
    Early,
    /// Server side, 2xx sent and waiting for the ACK
    Accepted,
    Connected,
    Terminated,
}

/// The caller's side of an INVITE session
#[derive(Debug)]
pub struct ClientInviteSession {
    handle: UsageHandle,
    dialog_id: DialogId,
    invite: Request,
    local_offer: Option<Bytes>,
    remote_answer: Option<Bytes>,
    state: InviteSessionState,
}

impl ClientInviteSession {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, creator: &BaseCreator) -> DumResult<Self> {
        if !matches!(creator.kind(), CreatorKind::InviteSession { .. }) {
            return Err(DumError::invalid_state(format!(
                "Cannot build an INVITE session from a pending {}",
                creator.method()
            )));
        }
        Ok(Self {
            handle,
            dialog_id,
            invite: creator.last_request().clone(),
            local_offer: creator.initial_offer().cloned(),
            remote_answer: None,
            state: InviteSessionState::Early,
        })
    }

    pub fn state(&self) -> InviteSessionState {
        self.state
    }

    pub fn local_offer(&self) -> Option<&Bytes> {
        self.local_offer.as_ref()
    }

    pub fn remote_answer(&self) -> Option<&Bytes> {
        self.remote_answer.as_ref()
    }

    fn on_response(&mut self, response: &Response, outbox: &mut Outbox) -> UsageOutcome {
        let is_invite = response.cseq().map(|c| c.method == Method::Invite).unwrap_or(false);
        if !is_invite {
            debug!("ClientInviteSession {} ignoring {}", self.handle, response.brief());
            return UsageOutcome::Continue;
        }

        let status = response.status();
        if status.is_provisional() {
            self.state = InviteSessionState::Early;
            UsageOutcome::Continue
        } else if status.is_success() {
            match create_ack(&self.invite, response) {
                Ok(ack) => outbox.push(ack),
                Err(e) => warn!("Unable to acknowledge {}: {}", response.brief(), e),
            }
            if !response.body.is_empty() {
                self.remote_answer = Some(response.body.clone());
            }
            self.state = InviteSessionState::Connected;
            UsageOutcome::Continue
        } else {
            self.state = InviteSessionState::Terminated;
            UsageOutcome::Terminate
        }
    }

    fn on_request(&mut self, request: &Request, outbox: &mut Outbox) -> UsageOutcome {
        let local_tag = self.dialog_id.local_tag();
        match request.method {
            Method::Bye => {
                outbox.push(answer(request, StatusCode::OK, local_tag));
                self.state = InviteSessionState::Terminated;
                UsageOutcome::Terminate
            }
            Method::Ack => UsageOutcome::Continue,
            _ => {
                outbox.push(answer(request, StatusCode::NOT_IMPLEMENTED, local_tag));
                UsageOutcome::Continue
            }
        }
    }
}

impl BaseUsage for ClientInviteSession {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ClientInviteSession
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn dispatch(&mut self, message: &SipMessage, outbox: &mut Outbox) -> UsageOutcome {
        match message {
            SipMessage::Response(response) => self.on_response(response, outbox),
            SipMessage::Request(request) => self.on_request(request, outbox),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The callee's side of an INVITE session
#[derive(Debug)]
pub struct ServerInviteSession {
    handle: UsageHandle,
    dialog_id: DialogId,
    invite: Request,
    remote_offer: Option<Bytes>,
    state: InviteSessionState,
}

impl ServerInviteSession {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, request: &Request) -> DumResult<Self> {
        if request.method != Method::Invite {
            return Err(DumError::protocol(format!(
                "INVITE session cannot start from {}",
                request.method
            )));
        }
        let remote_offer = (!request.body.is_empty()).then(|| request.body.clone());
        Ok(Self {
            handle,
            dialog_id,
            invite: request.clone(),
            remote_offer,
            state: InviteSessionState::Proceeding,
        })
    }

    pub fn state(&self) -> InviteSessionState {
        self.state
    }

    /// Tag we stamp on every response in this session
    pub fn local_tag(&self) -> &str {
        self.dialog_id.local_tag()
    }

    pub fn invite(&self) -> &Request {
        &self.invite
    }

    pub fn remote_offer(&self) -> Option<&Bytes> {
        self.remote_offer.as_ref()
    }
}

impl BaseUsage for ServerInviteSession {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ServerInviteSession
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn dispatch(&mut self, message: &SipMessage, outbox: &mut Outbox) -> UsageOutcome {
        let request = match message {
            SipMessage::Request(request) => request,
            SipMessage::Response(response) => {
                debug!("ServerInviteSession {} ignoring {}", self.handle, response.brief());
                return UsageOutcome::Continue;
            }
        };

        let local_tag = self.dialog_id.local_tag();
        match request.method {
            Method::Cancel => {
                outbox.push(answer(request, StatusCode::OK, local_tag));
                if self.state != InviteSessionState::Proceeding {
                    return UsageOutcome::Continue;
                }
                outbox.push(answer(&self.invite, StatusCode::REQUEST_TERMINATED, local_tag));
                self.state = InviteSessionState::Terminated;
                UsageOutcome::Terminate
            }
            Method::Ack => {
                if self.state == InviteSessionState::Accepted {
                    self.state = InviteSessionState::Connected;
                }
                UsageOutcome::Continue
            }
            Method::Bye => {
                outbox.push(answer(request, StatusCode::OK, local_tag));
                self.state = InviteSessionState::Terminated;
                UsageOutcome::Terminate
            }
            _ => {
                outbox.push(answer(request, StatusCode::NOT_IMPLEMENTED, local_tag));
                UsageOutcome::Continue
            }
        }
    }

    fn respond(&mut self, status: StatusCode, outbox: &mut Outbox) -> DumResult<UsageOutcome> {
        if self.state != InviteSessionState::Proceeding {
            return Err(DumError::invalid_state(format!(
                "INVITE already answered, session is {:?}",
                self.state
            )));
        }
        outbox.push(answer(&self.invite, status, self.dialog_id.local_tag()));
        if status.is_provisional() {
            Ok(UsageOutcome::Continue)
        } else if status.is_success() {
            self.state = InviteSessionState::Accepted;
            Ok(UsageOutcome::Continue)
        } else {
            self.state = InviteSessionState::Terminated;
            Ok(UsageOutcome::Terminate)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
