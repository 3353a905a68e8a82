//! Standalone requests (OPTIONS, MESSAGE and tolerated out-of-dialog INFO/NOTIFY)

use std::any::Any;

use tracing::debug;

use super::{answer, BaseUsage, UsageHandle, UsageKind, UsageOutcome};
use crate::creator::{BaseCreator, CreatorKind};
use crate::dialog::DialogId;
use crate::errors::{DumError, DumResult};
use crate::message::{Method, Request, Response, SipMessage, StatusCode};
use crate::transport::Outbox;

/// A standalone request we sent
#[derive(Debug)]
pub struct ClientOutOfDialogReq {
    handle: UsageHandle,
    dialog_id: DialogId,
    request: Request,
    response: Option<Response>,
}

impl ClientOutOfDialogReq {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, creator: &BaseCreator) -> DumResult<Self> {
        if !matches!(creator.kind(), CreatorKind::OutOfDialog { .. }) {
            return Err(DumError::invalid_state(format!(
                "Cannot build an out-of-dialog request from a pending {}",
                creator.method()
            )));
        }
        Ok(Self {
            handle,
            dialog_id,
            request: creator.last_request().clone(),
            response: None,
        })
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Final response, once received
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }
}

impl BaseUsage for ClientOutOfDialogReq {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ClientOutOfDialogReq
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn handler_key(&self) -> Option<&str> {
        Some(self.request.method.as_str())
    }

    fn dispatch(&mut self, message: &SipMessage, _outbox: &mut Outbox) -> UsageOutcome {
        match message {
            SipMessage::Response(response) if response.status().is_final() => {
                self.response = Some(response.clone());
                UsageOutcome::Terminate
            }
            _ => UsageOutcome::Continue,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A standalone request received, held until the application answers it
#[derive(Debug)]
pub struct ServerOutOfDialogReq {
    handle: UsageHandle,
    dialog_id: DialogId,
    request: Request,
    answered: bool,
}

impl ServerOutOfDialogReq {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, request: Request) -> Self {
        Self {
            handle,
            dialog_id,
            request,
            answered: false,
        }
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn request(&self) -> &Request {
        &self.request
    }
}

impl BaseUsage for ServerOutOfDialogReq {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ServerOutOfDialogReq
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn handler_key(&self) -> Option<&str> {
        Some(self.request.method.as_str())
    }

    fn dispatch(&mut self, message: &SipMessage, _outbox: &mut Outbox) -> UsageOutcome {
        debug!("ServerOutOfDialogReq {} ignoring {}", self.handle, message.brief());
        UsageOutcome::Continue
    }

    fn respond(&mut self, status: StatusCode, outbox: &mut Outbox) -> DumResult<UsageOutcome> {
        if self.answered {
            return Err(DumError::invalid_state(format!("{} already answered", self.request.method)));
        }
        outbox.push(answer(&self.request, status, self.dialog_id.local_tag()));
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
