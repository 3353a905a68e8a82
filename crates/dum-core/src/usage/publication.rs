//! Publication usages (PUBLISH, RFC 3903)

use std::any::Any;

use tracing::{debug, info, warn};

use super::{answer, BaseUsage, UsageHandle, UsageKind, UsageOutcome};
use crate::creator::{BaseCreator, CreatorKind};
use crate::dialog::DialogId;
use crate::errors::{DumError, DumResult};
use crate::message::request_builders::create_refresh_request;
use crate::message::response_builders::generate_tag;
use crate::message::{HeaderAccess, HeaderName, Request, SipMessage, StatusCode, TypedHeader};
use crate::transport::{DumTimer, DumTimerKind, Outbox};

const SIP_ETAG: &str = "SIP-ETag";
const SIP_IF_MATCH: &str = "SIP-If-Match";

/// Event state we publish to a compositor
#[derive(Debug)]
pub struct ClientPublication {
    handle: UsageHandle,
    dialog_id: DialogId,
    event: String,
    request: Request,
    etag: Option<String>,
    expires: Option<u32>,
}

impl ClientPublication {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, creator: &BaseCreator) -> DumResult<Self> {
        let CreatorKind::Publication { event } = creator.kind() else {
            return Err(DumError::invalid_state(format!(
                "Cannot build a publication from a pending {}",
                creator.method()
            )));
        };
        Ok(Self {
            handle,
            dialog_id,
            event: event.clone(),
            request: creator.last_request().clone(),
            etag: None,
            expires: None,
        })
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Entity tag assigned by the compositor
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn expires(&self) -> Option<u32> {
        self.expires
    }

    pub fn last_request(&self) -> &Request {
        &self.request
    }
}

impl BaseUsage for ClientPublication {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ClientPublication
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn handler_key(&self) -> Option<&str> {
        Some(self.event.as_str())
    }

    fn dispatch(&mut self, message: &SipMessage, outbox: &mut Outbox) -> UsageOutcome {
        let response = match message {
            SipMessage::Response(response) => response,
            SipMessage::Request(request) => {
                outbox.push(answer(request, StatusCode::NOT_IMPLEMENTED, self.dialog_id.local_tag()));
                return UsageOutcome::Continue;
            }
        };

        let status = response.status();
        if status.is_provisional() {
            return UsageOutcome::Continue;
        }
        if status.is_failure() {
            info!("Publication {} of {} rejected: {}", self.handle, self.event, status);
            return UsageOutcome::Terminate;
        }
        self.etag = response.other_header(SIP_ETAG).map(str::to_string);
        self.expires = response.expires().or_else(|| self.request.expires());
        if self.expires == Some(0) {
            return UsageOutcome::Terminate;
        }
        UsageOutcome::Continue
    }

    fn dispatch_timer(&mut self, timer: &DumTimer, outbox: &mut Outbox) -> UsageOutcome {
        match timer.kind {
            DumTimerKind::SessionExpired => UsageOutcome::Terminate,
            DumTimerKind::Refresh => {
                let Some(etag) = self.etag.clone() else {
                    return UsageOutcome::Continue;
                };
                match create_refresh_request(&self.request) {
                    Ok(mut refresh) => {
                        // A refresh carries the entity tag and no body
                        refresh.body = Default::default();
                        refresh
                            .headers
                            .retain(|h| h.name() != HeaderName::ContentType);
                        refresh.set_header(TypedHeader::Other {
                            name: SIP_IF_MATCH.to_string(),
                            value: etag,
                        });
                        self.request = refresh.clone();
                        outbox.push(refresh);
                    }
                    Err(e) => warn!("Unable to refresh publication {}: {}", self.handle, e),
                }
                UsageOutcome::Continue
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A PUBLISH received from an event publication agent
#[derive(Debug)]
pub struct ServerPublication {
    handle: UsageHandle,
    dialog_id: DialogId,
    event: String,
    request: Request,
    answered: bool,
}

impl ServerPublication {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, request: &Request) -> DumResult<Self> {
        let event = request
            .event()
            .ok_or_else(|| DumError::protocol("PUBLISH without Event header"))?
            .to_string();
        Ok(Self {
            handle,
            dialog_id,
            event,
            request: request.clone(),
            answered: false,
        })
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Entity tag the publisher wants to refresh or modify
    pub fn if_match(&self) -> Option<&str> {
        self.request.other_header(SIP_IF_MATCH)
    }
}

impl BaseUsage for ServerPublication {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ServerPublication
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn handler_key(&self) -> Option<&str> {
        Some(self.event.as_str())
    }

    fn dispatch(&mut self, message: &SipMessage, _outbox: &mut Outbox) -> UsageOutcome {
        debug!("ServerPublication {} ignoring {}", self.handle, message.brief());
        UsageOutcome::Continue
    }

    fn respond(&mut self, status: StatusCode, outbox: &mut Outbox) -> DumResult<UsageOutcome> {
        if self.answered {
            return Err(DumError::invalid_state("PUBLISH already answered"));
        }
        let mut response = answer(&self.request, status, self.dialog_id.local_tag());
        if status.is_success() {
            response.set_header(TypedHeader::Other {
                name: SIP_ETAG.to_string(),
                value: generate_tag(),
            });
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
