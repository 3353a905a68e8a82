//! Subscription usages (SUBSCRIBE/NOTIFY and implicit REFER subscriptions)

use std::any::Any;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::{answer, BaseUsage, UsageHandle, UsageKind, UsageOutcome};
use crate::creator::{BaseCreator, CreatorKind};
use crate::dialog::DialogId;
use crate::errors::{DumError, DumResult};
use crate::message::request_builders::create_refresh_request;
use crate::message::{HeaderAccess, Method, Request, SipMessage, StatusCode, TypedHeader};
use crate::transport::{DumTimer, DumTimerKind, Outbox};

/// A subscription we hold towards a notifier
#[derive(Debug)]
pub struct ClientSubscription {
    handle: UsageHandle,
    dialog_id: DialogId,
    event: String,
    request: Request,
    active: bool,
    expires: Option<u32>,
    notify_count: u32,
    last_notify_body: Option<Bytes>,
}

impl ClientSubscription {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, creator: &BaseCreator) -> DumResult<Self> {
        let CreatorKind::Subscription { event } = creator.kind() else {
            return Err(DumError::invalid_state(format!(
                "Cannot build a subscription from a pending {}",
                creator.method()
            )));
        };
        Ok(Self {
            handle,
            dialog_id,
            event: event.clone(),
            request: creator.last_request().clone(),
            active: false,
            expires: None,
            notify_count: 0,
            last_notify_body: None,
        })
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn expires(&self) -> Option<u32> {
        self.expires
    }

    /// NOTIFYs received so far
    pub fn notify_count(&self) -> u32 {
        self.notify_count
    }

    pub fn last_notify_body(&self) -> Option<&Bytes> {
        self.last_notify_body.as_ref()
    }

    pub fn last_request(&self) -> &Request {
        &self.request
    }

    fn on_notify(&mut self, notify: &Request, outbox: &mut Outbox) -> UsageOutcome {
        outbox.push(answer(notify, StatusCode::OK, self.dialog_id.local_tag()));
        self.notify_count += 1;
        if !notify.body.is_empty() {
            self.last_notify_body = Some(notify.body.clone());
        }

        match notify.other_header("Subscription-State") {
            Some(state) if state.trim_start().to_ascii_lowercase().starts_with("terminated") => {
                info!("Subscription {} to {} terminated by notifier", self.handle, self.event);
                self.active = false;
                UsageOutcome::Terminate
            }
            Some(state) if state.trim_start().to_ascii_lowercase().starts_with("active") => {
                self.active = true;
                UsageOutcome::Continue
            }
            _ => UsageOutcome::Continue,
        }
    }
}

impl BaseUsage for ClientSubscription {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ClientSubscription
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn handler_key(&self) -> Option<&str> {
        Some(self.event.as_str())
    }

    fn dispatch(&mut self, message: &SipMessage, outbox: &mut Outbox) -> UsageOutcome {
        match message {
            SipMessage::Request(request) if request.method == Method::Notify => self.on_notify(request, outbox),
            SipMessage::Request(request) => {
                outbox.push(answer(request, StatusCode::NOT_IMPLEMENTED, self.dialog_id.local_tag()));
                UsageOutcome::Continue
            }
            SipMessage::Response(response) => {
                let status = response.status();
                if status.is_provisional() {
                    UsageOutcome::Continue
                } else if status.is_success() {
                    self.active = true;
                    self.expires = response.expires().or(self.expires);
                    UsageOutcome::Continue
                } else {
                    info!("Subscription {} to {} rejected: {}", self.handle, self.event, status);
                    self.active = false;
                    UsageOutcome::Terminate
                }
            }
        }
    }

    fn dispatch_timer(&mut self, timer: &DumTimer, outbox: &mut Outbox) -> UsageOutcome {
        match timer.kind {
            DumTimerKind::SessionExpired => UsageOutcome::Terminate,
            DumTimerKind::Refresh if !self.active => UsageOutcome::Continue,
            DumTimerKind::Refresh => {
                match create_refresh_request(&self.request) {
                    Ok(mut refresh) => {
                        // In-dialog refresh: the notifier's tag goes into To
                        let remote_tag = self.dialog_id.remote_tag().to_string();
                        for header in refresh.headers.iter_mut() {
                            if let TypedHeader::To(to) = header {
                                if to.tag.is_none() {
                                    to.set_tag(remote_tag.clone());
                                }
                            }
                        }
                        self.request = refresh.clone();
                        outbox.push(refresh);
                    }
                    Err(e) => warn!("Unable to refresh subscription {}: {}", self.handle, e),
                }
                UsageOutcome::Continue
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A subscription a peer holds towards us
#[derive(Debug)]
pub struct ServerSubscription {
    handle: UsageHandle,
    dialog_id: DialogId,
    event: String,
    pending: Option<Request>,
    accepted: bool,
    expires: Option<u32>,
}

impl ServerSubscription {
    pub fn new(handle: UsageHandle, dialog_id: DialogId, request: &Request) -> DumResult<Self> {
        let event = match (request.event(), &request.method) {
            (Some(event), _) => event.to_string(),
            (None, Method::Refer) => "refer".to_string(),
            (None, method) => {
                return Err(DumError::protocol(format!("{} without Event header", method)));
            }
        };
        Ok(Self {
            handle,
            dialog_id,
            event,
            pending: Some(request.clone()),
            accepted: false,
            expires: None,
        })
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn expires(&self) -> Option<u32> {
        self.expires
    }

    /// SUBSCRIBE or REFER still waiting for an answer
    pub fn pending_request(&self) -> Option<&Request> {
        self.pending.as_ref()
    }
}

impl BaseUsage for ServerSubscription {
    fn handle(&self) -> UsageHandle {
        self.handle
    }

    fn kind(&self) -> UsageKind {
        UsageKind::ServerSubscription
    }

    fn dialog_id(&self) -> &DialogId {
        &self.dialog_id
    }

    fn handler_key(&self) -> Option<&str> {
        Some(self.event.as_str())
    }

    fn dispatch(&mut self, message: &SipMessage, outbox: &mut Outbox) -> UsageOutcome {
        match message {
            SipMessage::Request(request) if matches!(request.method, Method::Subscribe | Method::Refer) => {
                if self.pending.is_some() {
                    warn!("ServerSubscription {} replacing an unanswered request", self.handle);
                }
                self.pending = Some(request.clone());
            }
            SipMessage::Request(request) => {
                outbox.push(answer(request, StatusCode::NOT_IMPLEMENTED, self.dialog_id.local_tag()));
            }
            SipMessage::Response(response) => {
                debug!("ServerSubscription {} got {}", self.handle, response.brief());
            }
        }
        UsageOutcome::Continue
    }

    fn respond(&mut self, status: StatusCode, outbox: &mut Outbox) -> DumResult<UsageOutcome> {
        let request = self
            .pending
            .take()
            .ok_or_else(|| DumError::invalid_state("No subscription request awaiting an answer"))?;

        let mut response = answer(&request, status, self.dialog_id.local_tag());
        if status.is_provisional() {
            outbox.push(response);
            self.pending = Some(request);
            return Ok(UsageOutcome::Continue);
        }
        if status.is_failure() {
            outbox.push(response);
            return Ok(UsageOutcome::Terminate);
        }

        self.accepted = true;
        self.expires = request.expires();
        if let Some(expires) = self.expires {
            response.set_header(TypedHeader::Expires(expires));
        }
        outbox.push(response);
        if self.expires == Some(0) {
            Ok(UsageOutcome::Terminate)
        } else {
            Ok(UsageOutcome::Continue)
        }
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

    fn client_subscription() -> (ClientSubscription, Request) {
        let request = create_test_request(Method::Subscribe).with_header(TypedHeader::Event("presence".into()));
        let creator = BaseCreator::new(
            CreatorKind::Subscription {
                event: "presence".to_string(),
            },
            request.clone(),
        );
        let set_id = DialogSetId::from_response(&create_response(&request, StatusCode::OK)).unwrap();
        let usage = ClientSubscription::new(UsageHandle::from_raw(5), DialogId::new(set_id, "notifier"), &creator).unwrap();
        (usage, request)
    }

    fn notify(state: &str) -> Request {
        create_test_request(Method::Notify).with_header(TypedHeader::Other {
            name: "Subscription-State".to_string(),
            value: state.to_string(),
        })
    }

    #[test]
    fn test_notify_is_answered_and_counted() {
        let (mut usage, _) = client_subscription();
        let mut outbox = Outbox::new();

        let outcome = usage.dispatch(&SipMessage::Request(notify("active;expires=600")), &mut outbox);
        assert_eq!(outcome, UsageOutcome::Continue);
        assert!(usage.is_active());
        assert_eq!(usage.notify_count(), 1);
        assert_eq!(outbox.drain()[0].as_response().unwrap().status(), StatusCode::OK);

        let outcome = usage.dispatch(&SipMessage::Request(notify("terminated;reason=timeout")), &mut outbox);
        assert_eq!(outcome, UsageOutcome::Terminate);
        assert_eq!(usage.notify_count(), 2);
    }

    #[test]
    fn test_refresh_targets_notifier_tag() {
        let (mut usage, request) = client_subscription();
        let mut outbox = Outbox::new();
        let ok = create_response(&request, StatusCode::ACCEPTED).with_to_tag("notifier");
        usage.dispatch(&SipMessage::Response(ok), &mut outbox);

        usage.dispatch_timer(&DumTimer::new(usage.handle(), DumTimerKind::Refresh), &mut outbox);
        let sent = outbox.drain();
        let refresh = sent[0].as_request().unwrap();
        assert_eq!(refresh.to_tag(), Some("notifier"));
        assert_eq!(refresh.cseq().unwrap().seq, 2);
    }

    #[test]
    fn test_server_subscription_requires_event() {
        let request = create_test_request(Method::Subscribe);
        let dialog_id = DialogId::from_request(&request).unwrap();
        let err = ServerSubscription::new(UsageHandle::from_raw(6), dialog_id.clone(), &request).unwrap_err();
        assert!(matches!(err, DumError::Protocol { .. }));

        let refer = create_test_request(Method::Refer);
        let usage = ServerSubscription::new(UsageHandle::from_raw(7), dialog_id, &refer).unwrap();
        assert_eq!(usage.event(), "refer");
    }

    #[test]
    fn test_server_subscription_accept_and_unsubscribe() {
        let request = create_test_request(Method::Subscribe)
            .with_header(TypedHeader::Event("dialog".into()))
            .with_header(TypedHeader::Expires(300));
        let dialog_id = DialogId::from_request(&request).unwrap();
        let mut usage = ServerSubscription::new(UsageHandle::from_raw(8), dialog_id, &request).unwrap();
        let mut outbox = Outbox::new();

        assert_eq!(usage.respond(StatusCode::ACCEPTED, &mut outbox).unwrap(), UsageOutcome::Continue);
        assert!(usage.is_accepted());
        assert!(usage.respond(StatusCode::OK, &mut outbox).is_err());

        let mut unsubscribe = create_refresh_request(&request).unwrap();
        unsubscribe.set_header(TypedHeader::Expires(0));
        usage.dispatch(&SipMessage::Request(unsubscribe), &mut outbox);
        assert_eq!(usage.respond(StatusCode::OK, &mut outbox).unwrap(), UsageOutcome::Terminate);
    }
}
