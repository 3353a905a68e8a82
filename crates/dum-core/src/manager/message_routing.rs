//! Inbound message routing
//!
//! ```text
//! DumEvent::Request
//!   → validate_request → validate_to_target → merge check → server auth
//!   → no To tag: create a dialog set (or ACK/CANCEL/481 handling)
//!   → To tag:    forward into the existing dialog set, else 481
//!
//! DumEvent::Response
//!   → client auth → dialog set by (Call-ID, From tag) → usage or creator
//!
//! DumEvent::Timer
//!   → usage by handle
//! ```
//!
//! Every rejection produces exactly one response and leaves nothing behind.
//! Conditions that only a broken transaction layer can produce (a CANCEL
//! with no INVITE, a second dialog-creating request for a live set, a
//! method nobody can route) are treated as defects and panic.

use tracing::{debug, error, info, warn};

use super::core::DialogUsageManager;
use crate::dialog::{Dialog, DialogId, DialogSet, DialogSetId};
use crate::errors::{DumError, DumResult};
use crate::message::response_builders::create_failure_response;
use crate::message::{HeaderAccess, Method, Request, Response, SipMessage, StatusCode};
use crate::transport::{DumEvent, DumTimer, Outbox};
use crate::usage::{UsageCategory, UsageHandle, UsageKind, UsageOutcome};
use crate::validation::{validate_request, validate_to_target};

impl DialogUsageManager {
    /// Route one inbound event, queueing whatever it produces
    pub(crate) fn dispatch(&mut self, event: DumEvent, outbox: &mut Outbox) {
        match event {
            DumEvent::Request(request) => self.on_request(request, outbox),
            DumEvent::Response(response) => self.on_response(response, outbox),
            DumEvent::Timer(timer) => self.on_timer(timer, outbox),
        }
    }

    fn on_request(&mut self, request: Request, outbox: &mut Outbox) {
        debug!("Received {}", request.brief());

        let admitted = validate_request(self.profile.as_ref(), &request)
            .and_then(|_| validate_to_target(self.profile.as_ref(), &request));
        if let Err(rejection) = admitted {
            if request.method == Method::Ack {
                debug!("Dropping inadmissible {}", request.brief());
            } else {
                outbox.push(rejection);
            }
            return;
        }

        if self.is_merged_request(&request) {
            self.reject(&request, StatusCode::LOOP_DETECTED, None, outbox);
            return;
        }

        if let Some(auth) = self.server_auth.as_mut() {
            if !auth.handle(&request) {
                info!("{} not admitted by server auth", request.brief());
                if let Some(challenge) = auth.challenge(&request) {
                    outbox.push(challenge);
                }
                return;
            }
        }

        if request.to_tag().is_some() {
            self.route_in_dialog(request, outbox);
        } else {
            self.route_out_of_dialog(request, outbox);
        }
    }

    /// A second copy of a dialog-creating request that reached us over another path
    fn is_merged_request(&self, request: &Request) -> bool {
        if request.to_tag().is_some() {
            return false;
        }
        DialogSetId::from_request(request)
            .ok()
            .and_then(|id| self.dialog_sets.get(&id))
            .map(|set| set.is_merged(request))
            .unwrap_or(false)
    }

    fn route_out_of_dialog(&mut self, request: Request, outbox: &mut Outbox) {
        match request.method {
            Method::Ack => debug!("Discarding stray {}", request.brief()),
            Method::Prack | Method::Bye | Method::Update => {
                self.reject(&request, StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST, None, outbox);
            }
            Method::Cancel => self.route_cancel(request, outbox),
            Method::Invite
            | Method::Subscribe
            | Method::Refer
            | Method::Register
            | Method::Publish
            | Method::Message
            | Method::Options
            | Method::Info
            | Method::Notify => self.create_server_dialog_set(request, outbox),
            Method::Service | Method::Extension(_) => {
                error!("No route for {}", request.brief());
                panic!("request method {} cannot be routed", request.method);
            }
        }
    }

    fn route_cancel(&mut self, request: Request, outbox: &mut Outbox) {
        let id = match DialogSetId::from_request(&request) {
            Ok(id) => id,
            Err(e) => return self.reject_with_error(&request, &e, outbox),
        };
        let Some(set) = self.dialog_sets.get(&id) else {
            error!("CANCEL for unknown dialog set {}", id);
            panic!("CANCEL reached the dialog usage manager without dialog set {}", id);
        };
        let session = set.invite_sessions().into_iter().find(|handle| {
            self.usages
                .get(*handle)
                .map(|usage| usage.kind() == UsageKind::ServerInviteSession)
                .unwrap_or(false)
        });

        match session {
            Some(handle) => self.dispatch_to_usage(handle, &SipMessage::Request(request), outbox),
            None => self.reject(&request, StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST, None, outbox),
        }
    }

    /// New server dialog set seeded by a dialog-creating request
    fn create_server_dialog_set(&mut self, request: Request, outbox: &mut Outbox) {
        let id = match DialogSetId::from_request(&request) {
            Ok(id) => id,
            Err(e) => return self.reject_with_error(&request, &e, outbox),
        };
        if self.dialog_sets.contains_key(&id) {
            error!("Dialog set {} already exists for {}", id, request.brief());
            panic!("duplicate dialog set {} created by {}", id, request.brief());
        }
        if !self.is_event_supported(&request) {
            self.reject(&request, StatusCode::BAD_EVENT, None, outbox);
            return;
        }

        match self.establish_server_dialog_set(id.clone(), &request) {
            Ok(handle) => debug!("Dialog set {} created for usage {}", id, handle),
            Err(e) => {
                info!("Unable to create dialog set for {}: {}", request.brief(), e);
                self.discard_dialog_set(&id);
                self.reject_with_error(&request, &e, outbox);
            }
        }
    }

    fn establish_server_dialog_set(&mut self, id: DialogSetId, request: &Request) -> DumResult<UsageHandle> {
        let kind = UsageKind::server_for_initial(&request.method)
            .ok_or_else(|| DumError::protocol(format!("{} cannot create a dialog set", request.method)))?;
        let set = DialogSet::from_request(id, request)?;
        let dialog_id = DialogId::from_request(request)?;
        self.insert_dialog_set(set)?;
        self.find_dialog_set_mut(dialog_id.dialog_set_id())?
            .add_dialog(Dialog::from_request(dialog_id.clone(), request))?;
        self.create_usage(kind, &dialog_id, &SipMessage::Request(request.clone()))
    }

    /// False for a SUBSCRIBE whose event package has no server subscription handler
    fn is_event_supported(&self, request: &Request) -> bool {
        if request.method != Method::Subscribe {
            return true;
        }
        match request.event() {
            Some(event) => self.handlers.has_server_subscription_handler(event),
            None => true,
        }
    }

    fn route_in_dialog(&mut self, request: Request, outbox: &mut Outbox) {
        if request.method == Method::Register {
            self.reject(&request, StatusCode::BAD_REQUEST, None, outbox);
            return;
        }
        let id = match DialogSetId::from_request(&request) {
            Ok(id) => id,
            Err(e) => return self.reject_with_error(&request, &e, outbox),
        };

        let live = self.dialog_sets.get(&id).map(|set| !set.is_empty()).unwrap_or(false);
        if !live {
            if request.method == Method::Ack {
                debug!("Discarding {} for unknown dialog set {}", request.brief(), id);
            } else {
                self.reject(&request, StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST, None, outbox);
            }
            return;
        }
        self.forward_request_to_set(request, outbox);
    }

    fn forward_request_to_set(&mut self, request: Request, outbox: &mut Outbox) {
        let dialog_id = match DialogId::from_request(&request) {
            Ok(id) => id,
            Err(e) => return self.reject_with_error(&request, &e, outbox),
        };
        let category = UsageCategory::for_method(&request.method);

        // None: no such dialog. Some((in_order, usage)): the dialog's verdict
        let existing = self
            .dialog_sets
            .get_mut(dialog_id.dialog_set_id())
            .and_then(|set| set.find_dialog_mut(&dialog_id))
            .map(|dialog| (dialog.accept_remote_cseq(&request), dialog.usage(category)));

        match existing {
            Some((false, _)) => {
                warn!("Out of order CSeq on {} in dialog {}", request.brief(), dialog_id);
                self.reject(&request, StatusCode::SERVER_INTERNAL_ERROR, Some("CSeq out of order"), outbox);
            }
            Some((true, Some(handle))) => self.dispatch_to_usage(handle, &SipMessage::Request(request), outbox),
            Some((true, None)) => self.create_in_dialog_usage(dialog_id, request, outbox),
            None => self.create_dialog_for_request(dialog_id, request, outbox),
        }
    }

    /// In-dialog request starting a new usage, e.g. a SUBSCRIBE inside an INVITE dialog
    fn create_in_dialog_usage(&mut self, dialog_id: DialogId, request: Request, outbox: &mut Outbox) {
        let Some(kind) = UsageKind::server_in_dialog(&request.method) else {
            if request.method == Method::Ack {
                debug!("Discarding {} with no session in dialog {}", request.brief(), dialog_id);
            } else {
                self.reject(&request, StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST, None, outbox);
            }
            return;
        };
        if !self.is_event_supported(&request) {
            self.reject(&request, StatusCode::BAD_EVENT, None, outbox);
            return;
        }
        if let Err(e) = self.create_usage(kind, &dialog_id, &SipMessage::Request(request.clone())) {
            info!("Unable to create {} for {}: {}", kind, request.brief(), e);
            self.reject_with_error(&request, &e, outbox);
        }
    }

    /// Request for a dialog the set does not know yet
    ///
    /// The only legitimate case is a NOTIFY racing ahead of the 2xx to our
    /// SUBSCRIBE: the notifier's tag names the new dialog.
    fn create_dialog_for_request(&mut self, dialog_id: DialogId, request: Request, outbox: &mut Outbox) {
        let awaiting_notify = request.method == Method::Notify
            && self
                .dialog_sets
                .get(dialog_id.dialog_set_id())
                .and_then(|set| set.creator())
                .map(|creator| creator.usage_kind() == UsageKind::ClientSubscription)
                .unwrap_or(false);
        if !awaiting_notify {
            self.reject(&request, StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST, None, outbox);
            return;
        }

        let added = self
            .find_dialog_set_mut(dialog_id.dialog_set_id())
            .and_then(|set| set.add_dialog(Dialog::from_request(dialog_id.clone(), &request)));
        let message = SipMessage::Request(request.clone());
        let created = added.and_then(|_| self.create_usage(UsageKind::ClientSubscription, &dialog_id, &message));

        match created {
            Ok(handle) => self.dispatch_to_usage(handle, &message, outbox),
            Err(e) => {
                warn!("Unable to accept early NOTIFY in dialog {}: {}", dialog_id, e);
                if let Some(set) = self.dialog_sets.get_mut(dialog_id.dialog_set_id()) {
                    set.remove_dialog_if_empty(&dialog_id);
                }
                self.reject(&request, StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST, None, outbox);
            }
        }
    }

    fn on_response(&mut self, response: Response, outbox: &mut Outbox) {
        debug!("Received {}", response.brief());

        if let Some(auth) = self.client_auth.as_mut() {
            if !auth.handle(&response) {
                debug!("{} consumed by client auth", response.brief());
                return;
            }
        }
        if response.status().is_redirect() {
            if let Some(redirect) = self.redirect.as_mut() {
                if !redirect.handle(&response) {
                    debug!("{} consumed by redirect manager", response.brief());
                    return;
                }
            }
        }

        let set_id = match DialogSetId::from_response(&response) {
            Ok(id) => id,
            Err(e) => {
                debug!("Discarding {}: {}", response.brief(), e);
                return;
            }
        };
        match self.dialog_sets.get(&set_id) {
            Some(set) if !set.is_empty() => self.forward_response_to_set(set_id, response, outbox),
            _ => debug!("Discarding {}: no dialog set {}", response.brief(), set_id),
        }
    }

    fn forward_response_to_set(&mut self, set_id: DialogSetId, response: Response, outbox: &mut Outbox) {
        let Some(method) = response.cseq().map(|cseq| cseq.method.clone()) else {
            debug!("Discarding {} without CSeq", response.brief());
            return;
        };
        let dialog_id = match DialogId::from_response(&response) {
            Ok(id) => id,
            Err(e) => {
                debug!("Discarding {}: {}", response.brief(), e);
                return;
            }
        };
        let status = response.status();
        let category = UsageCategory::for_method(&method);

        let (existing, from_creator) = match self.dialog_sets.get(&set_id) {
            Some(set) => (
                dialog_id
                    .as_ref()
                    .and_then(|id| set.usage_for_response(id, category)),
                set.creator().map(|c| c.is_response_to(&method)).unwrap_or(false),
            ),
            None => return,
        };

        let message = SipMessage::Response(response.clone());
        let mut handled = false;
        if let Some(handle) = existing {
            if status.is_success() {
                self.confirm_dialog(dialog_id.as_ref());
            }
            self.dispatch_to_usage(handle, &message, outbox);
            handled = true;
        } else if from_creator && status.as_u16() > 100 && !status.is_failure() {
            if let Some(dialog_id) = dialog_id {
                handled = self.create_client_usage(dialog_id, &response, outbox);
            }
        }

        if from_creator && status.is_failure() && method == Method::Invite {
            self.end_early_sessions(&set_id, existing, &message, outbox);
        }

        if from_creator && status.is_final() {
            if let Some(set) = self.dialog_sets.get_mut(&set_id) {
                if let Some(creator) = set.release_creator() {
                    debug!("Creator of dialog set {} released on {}", set_id, status);
                    if status.is_failure() && !handled {
                        info!("{} for dialog set {} failed: {}", creator.method(), set_id, status);
                        self.handlers.notify_failure(&creator, &set_id, &response);
                    }
                }
            }
        }
        self.reap_dialog_set(&set_id);
    }

    /// A failed INVITE ends every early dialog it created (RFC 3261 Section 13.2.2.3)
    ///
    /// The final may come from another fork or from the transaction layer
    /// without a To tag, so it is handed to each early session in the set.
    fn end_early_sessions(
        &mut self,
        set_id: &DialogSetId,
        already: Option<UsageHandle>,
        message: &SipMessage,
        outbox: &mut Outbox,
    ) {
        let Some(set) = self.dialog_sets.get(set_id) else {
            return;
        };
        let early: Vec<UsageHandle> = set
            .invite_sessions()
            .into_iter()
            .filter(|handle| Some(*handle) != already)
            .filter(|handle| {
                self.usages
                    .get(*handle)
                    .map(|usage| usage.kind() == UsageKind::ClientInviteSession)
                    .unwrap_or(false)
            })
            .collect();
        for handle in early {
            debug!("Ending early session {} on {}", handle, message.brief());
            self.dispatch_to_usage(handle, message, outbox);
        }
    }

    /// First response with a To tag for a pending request: new dialog and usage
    fn create_client_usage(&mut self, dialog_id: DialogId, response: &Response, outbox: &mut Outbox) -> bool {
        let Some(kind) = self
            .dialog_sets
            .get(dialog_id.dialog_set_id())
            .and_then(|set| set.creator())
            .map(|creator| creator.usage_kind())
        else {
            return false;
        };

        let added = self
            .find_dialog_set_mut(dialog_id.dialog_set_id())
            .and_then(|set| set.add_dialog(Dialog::from_response(dialog_id.clone(), response)));
        if let Err(e) = added {
            warn!("Unable to add dialog {}: {}", dialog_id, e);
            return false;
        }

        let message = SipMessage::Response(response.clone());
        match self.create_usage(kind, &dialog_id, &message) {
            Ok(handle) => {
                self.dispatch_to_usage(handle, &message, outbox);
                true
            }
            Err(e) => {
                warn!("Unable to create {} in dialog {}: {}", kind, dialog_id, e);
                if let Some(set) = self.dialog_sets.get_mut(dialog_id.dialog_set_id()) {
                    set.remove_dialog_if_empty(&dialog_id);
                }
                false
            }
        }
    }

    fn confirm_dialog(&mut self, dialog_id: Option<&DialogId>) {
        let Some(dialog_id) = dialog_id else {
            return;
        };
        if let Some(dialog) = self
            .dialog_sets
            .get_mut(dialog_id.dialog_set_id())
            .and_then(|set| set.find_dialog_mut(dialog_id))
        {
            dialog.confirm();
        }
    }

    fn on_timer(&mut self, timer: DumTimer, outbox: &mut Outbox) {
        let outcome = match self.usages.get_mut(timer.handle) {
            Ok(usage) => usage.dispatch_timer(&timer, outbox),
            Err(_) => {
                debug!("Discarding {:?} timer for stale usage {}", timer.kind, timer.handle);
                return;
            }
        };
        if outcome == UsageOutcome::Terminate {
            self.destroy_usage(timer.handle);
        }
    }

    /// Hand a message to a usage and tear it down if it is finished
    pub(crate) fn dispatch_to_usage(&mut self, handle: UsageHandle, message: &SipMessage, outbox: &mut Outbox) {
        let outcome = match self.usages.get_mut(handle) {
            Ok(usage) => usage.dispatch(message, outbox),
            Err(e) => {
                warn!("Dropping {}: {}", message.brief(), e);
                return;
            }
        };
        if outcome == UsageOutcome::Terminate {
            self.destroy_usage(handle);
        }
    }

    fn reject(&self, request: &Request, status: StatusCode, reason: Option<&str>, outbox: &mut Outbox) {
        if request.method == Method::Ack {
            debug!("Not answering {} with {}", request.brief(), status);
            return;
        }
        info!("Rejecting {} with {}", request.brief(), status);
        outbox.push(create_failure_response(request, status, reason));
    }

    fn reject_with_error(&self, request: &Request, error: &DumError, outbox: &mut Outbox) {
        self.reject(request, StatusCode::BAD_REQUEST, Some(&error.reason_phrase()), outbox);
    }
}
