//! Requests and responses originated by the application
//!
//! `make_*` builds a dialog-creating request, registers a client dialog set
//! holding its creator, and returns the request for the application to
//! [`send`](DialogUsageManager::send). Responses to it create the matching
//! client usage.

use bytes::Bytes;
use tracing::{debug, info};

use super::core::DialogUsageManager;
use crate::creator::{BaseCreator, CreatorKind};
use crate::dialog::{DialogSet, DialogSetId};
use crate::errors::{DumError, DumResult};
use crate::message::request_builders::{create_cancel, create_initial_request};
use crate::message::{HeaderAccess, Method, MimeType, NameAddr, Request, SipMessage, StatusCode, TypedHeader, Uri};
use crate::transport::Outbox;
use crate::usage::{UsageHandle, UsageOutcome};

impl DialogUsageManager {
    /// INVITE towards `target`, carrying `offer` as an SDP body when given
    pub fn make_invite_session(&mut self, target: Uri, offer: Option<Bytes>) -> DumResult<Request> {
        let mut request = self.initial_request(Method::Invite, target.clone(), NameAddr::new(target.clone()));
        if let Some(offer) = &offer {
            request.set_header(TypedHeader::ContentType(MimeType::sdp()));
            request.body = offer.clone();
        }
        let creator = BaseCreator::new(CreatorKind::InviteSession { target }, request.clone()).with_offer(offer);
        self.register_creator(creator)?;
        Ok(request)
    }

    /// REGISTER binding our contact to `aor` at the registrar of its domain
    pub fn make_registration(&mut self, aor: Uri) -> DumResult<Request> {
        let registrar = Uri::new(aor.scheme.clone(), aor.host.clone());
        let mut request = self.initial_request(Method::Register, registrar, NameAddr::new(aor.clone()));
        request.set_header(TypedHeader::From(with_tag_of(&request, aor.clone())));
        request.set_header(TypedHeader::Expires(self.config.registration_expiry));
        self.register_creator(BaseCreator::new(CreatorKind::Registration { aor }, request.clone()))?;
        Ok(request)
    }

    /// SUBSCRIBE to `event` state of `aor`
    pub fn make_subscription(&mut self, aor: Uri, event: &str) -> DumResult<Request> {
        let mut request = self.initial_request(Method::Subscribe, aor.clone(), NameAddr::new(aor));
        request.set_header(TypedHeader::Event(event.to_string()));
        request.set_header(TypedHeader::Expires(self.config.subscription_expiry));
        let creator = BaseCreator::new(
            CreatorKind::Subscription {
                event: event.to_string(),
            },
            request.clone(),
        );
        self.register_creator(creator)?;
        Ok(request)
    }

    /// PUBLISH of `event` state for `aor`
    pub fn make_publication(
        &mut self,
        aor: Uri,
        event: &str,
        content_type: MimeType,
        body: impl Into<Bytes>,
    ) -> DumResult<Request> {
        let mut request = self.initial_request(Method::Publish, aor.clone(), NameAddr::new(aor.clone()));
        request.set_header(TypedHeader::From(with_tag_of(&request, aor)));
        request.set_header(TypedHeader::Event(event.to_string()));
        request.set_header(TypedHeader::Expires(self.config.publication_expiry));
        request.set_header(TypedHeader::ContentType(content_type));
        request.body = body.into();
        let creator = BaseCreator::new(
            CreatorKind::Publication {
                event: event.to_string(),
            },
            request.clone(),
        );
        self.register_creator(creator)?;
        Ok(request)
    }

    /// Standalone OPTIONS or MESSAGE towards `target`
    pub fn make_out_of_dialog_request(&mut self, target: Uri, method: Method) -> DumResult<Request> {
        if !matches!(method, Method::Options | Method::Message) {
            return Err(DumError::invalid_state(format!(
                "{} is not a standalone request",
                method
            )));
        }
        let request = self.initial_request(method.clone(), target.clone(), NameAddr::new(target));
        self.register_creator(BaseCreator::new(CreatorKind::OutOfDialog { method }, request.clone()))?;
        Ok(request)
    }

    /// Stamp our capabilities on an outbound dialog-creating request
    pub fn prepare_initial_request(&self, request: &mut Request) {
        let option_tags = self.profile.supported_option_tags();
        if !option_tags.is_empty() {
            request.set_header(TypedHeader::Supported(option_tags));
        }
        request.set_header(TypedHeader::Allow(self.profile.allowed_methods()));
        if let Some(user_agent) = &self.config.user_agent {
            request.set_header(TypedHeader::UserAgent(user_agent.clone()));
        }
    }

    fn initial_request(&self, method: Method, target: Uri, to: NameAddr) -> Request {
        let from = NameAddr::new(self.config.identity.clone());
        let mut request = create_initial_request(method, target, from, to);
        request.set_header(TypedHeader::Contact(NameAddr::new(self.config.contact.clone())));
        self.prepare_initial_request(&mut request);
        request
    }

    fn register_creator(&mut self, creator: BaseCreator) -> DumResult<DialogSetId> {
        let id = DialogSetId::from_outbound_request(creator.last_request())?;
        self.insert_dialog_set(DialogSet::from_creator(id.clone(), creator))?;
        debug!("Client dialog set {} waiting for responses", id);
        Ok(id)
    }

    /// Hand a message to the stack
    ///
    /// A request resent for a pending creator (e.g. with credentials added)
    /// replaces the creator's copy so a later CANCEL or refresh matches it.
    pub async fn send(&mut self, message: impl Into<SipMessage>) -> DumResult<()> {
        let message = message.into();
        if let SipMessage::Request(request) = &message {
            if let Ok(id) = DialogSetId::from_outbound_request(request) {
                if let Some(creator) = self.dialog_sets.get_mut(&id).and_then(|set| set.creator_mut()) {
                    if creator.is_response_to(&request.method) {
                        creator.set_last_request(request.clone());
                    }
                }
            }
        }
        debug!("Sending {}", message.brief());
        self.stack.send(message).await
    }

    /// CANCEL the pending INVITE of a client dialog set
    pub async fn cancel(&mut self, id: &DialogSetId) -> DumResult<()> {
        let invite = match self.find_dialog_set(id)?.creator() {
            Some(creator) if matches!(creator.kind(), CreatorKind::InviteSession { .. }) => {
                creator.last_request().clone()
            }
            _ => {
                return Err(DumError::invalid_state(format!(
                    "Dialog set {} has no pending INVITE",
                    id
                )));
            }
        };
        let cancel = create_cancel(&invite)?;
        info!("Cancelling INVITE of dialog set {}", id);
        self.stack.send(cancel.into()).await
    }

    /// Answer the request a server usage is holding
    pub async fn respond(&mut self, handle: UsageHandle, status: StatusCode) -> DumResult<()> {
        let mut outbox = Outbox::new();
        let usage = self.usages.get_mut(handle)?;
        let outcome = usage.respond(status, &mut outbox)?;
        let dialog_id = usage.dialog_id().clone();

        if status.is_success() {
            if let Some(dialog) = self
                .dialog_sets
                .get_mut(dialog_id.dialog_set_id())
                .and_then(|set| set.find_dialog_mut(&dialog_id))
            {
                dialog.confirm();
            }
        }
        if outcome == UsageOutcome::Terminate {
            self.destroy_usage(handle);
        }
        self.flush(&mut outbox).await
    }
}

/// `aor` as a From value carrying the From tag already on `request`
fn with_tag_of(request: &Request, aor: Uri) -> NameAddr {
    let from = NameAddr::new(aor);
    match request.from_tag() {
        Some(tag) => from.with_tag(tag),
        None => from,
    }
}
