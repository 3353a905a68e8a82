//! Application handlers
//!
//! The manager tells the application about usages through these traits:
//! when one is created, when one is destroyed, and when a request we sent
//! failed before any usage existed. All methods default to doing nothing.
//!
//! Subscription and publication handlers are registered per event package,
//! out-of-dialog handlers per method.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::creator::BaseCreator;
use crate::dialog::DialogSetId;
use crate::message::{Method, Response, SipMessage};
use crate::usage::{UsageHandle, UsageKind};

pub trait InviteSessionHandler: Send + Sync {
    /// A client or server INVITE session was created by `message`
    fn on_new_session(&self, _handle: UsageHandle, _kind: UsageKind, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}

    /// Our INVITE was rejected before any dialog was established
    fn on_failure(&self, _dialog_set: &DialogSetId, _response: &Response) {}
}

pub trait ClientRegistrationHandler: Send + Sync {
    fn on_new(&self, _handle: UsageHandle, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}

    fn on_failure(&self, _dialog_set: &DialogSetId, _response: &Response) {}
}

pub trait ServerRegistrationHandler: Send + Sync {
    fn on_new(&self, _handle: UsageHandle, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}
}

pub trait ClientSubscriptionHandler: Send + Sync {
    fn on_new(&self, _handle: UsageHandle, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}

    fn on_failure(&self, _dialog_set: &DialogSetId, _response: &Response) {}
}

pub trait ServerSubscriptionHandler: Send + Sync {
    fn on_new(&self, _handle: UsageHandle, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}
}

pub trait ClientPublicationHandler: Send + Sync {
    fn on_new(&self, _handle: UsageHandle, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}

    fn on_failure(&self, _dialog_set: &DialogSetId, _response: &Response) {}
}

pub trait ServerPublicationHandler: Send + Sync {
    fn on_new(&self, _handle: UsageHandle, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}
}

/// Handles both sides of standalone requests of one method
pub trait OutOfDialogHandler: Send + Sync {
    fn on_new(&self, _handle: UsageHandle, _kind: UsageKind, _message: &SipMessage) {}

    fn on_terminated(&self, _handle: UsageHandle) {}

    fn on_failure(&self, _dialog_set: &DialogSetId, _response: &Response) {}
}

/// Handler slots, keyed by event package or method where it applies
#[derive(Default)]
pub struct HandlerRegistry {
    invite_session: Option<Arc<dyn InviteSessionHandler>>,
    client_registration: Option<Arc<dyn ClientRegistrationHandler>>,
    server_registration: Option<Arc<dyn ServerRegistrationHandler>>,
    client_subscription: HashMap<String, Arc<dyn ClientSubscriptionHandler>>,
    server_subscription: HashMap<String, Arc<dyn ServerSubscriptionHandler>>,
    client_publication: HashMap<String, Arc<dyn ClientPublicationHandler>>,
    server_publication: HashMap<String, Arc<dyn ServerPublicationHandler>>,
    out_of_dialog: HashMap<Method, Arc<dyn OutOfDialogHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("invite_session", &self.invite_session.is_some())
            .field("client_registration", &self.client_registration.is_some())
            .field("server_registration", &self.server_registration.is_some())
            .field("client_subscription", &self.client_subscription.keys().collect::<Vec<_>>())
            .field("server_subscription", &self.server_subscription.keys().collect::<Vec<_>>())
            .field("client_publication", &self.client_publication.keys().collect::<Vec<_>>())
            .field("server_publication", &self.server_publication.keys().collect::<Vec<_>>())
            .field("out_of_dialog", &self.out_of_dialog.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn event_key(event: &str) -> String {
    event.to_ascii_lowercase()
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_invite_session_handler(&mut self, handler: Arc<dyn InviteSessionHandler>) {
        self.invite_session = Some(handler);
    }

    pub fn set_client_registration_handler(&mut self, handler: Arc<dyn ClientRegistrationHandler>) {
        self.client_registration = Some(handler);
    }

    pub fn set_server_registration_handler(&mut self, handler: Arc<dyn ServerRegistrationHandler>) {
        self.server_registration = Some(handler);
    }

    pub fn add_client_subscription_handler(&mut self, event: &str, handler: Arc<dyn ClientSubscriptionHandler>) {
        self.client_subscription.insert(event_key(event), handler);
    }

    pub fn add_server_subscription_handler(&mut self, event: &str, handler: Arc<dyn ServerSubscriptionHandler>) {
        self.server_subscription.insert(event_key(event), handler);
    }

    pub fn add_client_publication_handler(&mut self, event: &str, handler: Arc<dyn ClientPublicationHandler>) {
        self.client_publication.insert(event_key(event), handler);
    }

    pub fn add_server_publication_handler(&mut self, event: &str, handler: Arc<dyn ServerPublicationHandler>) {
        self.server_publication.insert(event_key(event), handler);
    }

    pub fn add_out_of_dialog_handler(&mut self, method: Method, handler: Arc<dyn OutOfDialogHandler>) {
        self.out_of_dialog.insert(method, handler);
    }

    pub fn has_server_subscription_handler(&self, event: &str) -> bool {
        self.server_subscription.contains_key(&event_key(event))
    }

    pub fn has_out_of_dialog_handler(&self, method: &Method) -> bool {
        self.out_of_dialog.contains_key(method)
    }

    /// Method tokens are matched as sent; only event packages fold case
    fn out_of_dialog_for(&self, token: Option<&str>) -> Option<&Arc<dyn OutOfDialogHandler>> {
        let method: Method = token?.to_string().into();
        self.out_of_dialog.get(&method)
    }

    /// Tell the handler of `kind` about a new usage
    pub(crate) fn notify_new(&self, kind: UsageKind, token: Option<&str>, handle: UsageHandle, message: &SipMessage) {
        let key = token.map(event_key);
        let key = key.as_deref();
        let notified = match kind {
            UsageKind::ClientInviteSession | UsageKind::ServerInviteSession => match &self.invite_session {
                Some(h) => {
                    h.on_new_session(handle, kind, message);
                    true
                }
                None => false,
            },
            UsageKind::ClientRegistration => match &self.client_registration {
                Some(h) => {
                    h.on_new(handle, message);
                    true
                }
                None => false,
            },
            UsageKind::ServerRegistration => match &self.server_registration {
                Some(h) => {
                    h.on_new(handle, message);
                    true
                }
                None => false,
            },
            UsageKind::ClientSubscription => match key.and_then(|k| self.client_subscription.get(k)) {
                Some(h) => {
                    h.on_new(handle, message);
                    true
                }
                None => false,
            },
            UsageKind::ServerSubscription => match key.and_then(|k| self.server_subscription.get(k)) {
                Some(h) => {
                    h.on_new(handle, message);
                    true
                }
                None => false,
            },
            UsageKind::ClientPublication => match key.and_then(|k| self.client_publication.get(k)) {
                Some(h) => {
                    h.on_new(handle, message);
                    true
                }
                None => false,
            },
            UsageKind::ServerPublication => match key.and_then(|k| self.server_publication.get(k)) {
                Some(h) => {
                    h.on_new(handle, message);
                    true
                }
                None => false,
            },
            UsageKind::ClientOutOfDialogReq | UsageKind::ServerOutOfDialogReq => match self.out_of_dialog_for(token) {
                Some(h) => {
                    h.on_new(handle, kind, message);
                    true
                }
                None => false,
            },
        };
        if !notified {
            trace!("No handler registered for new {} {}", kind, handle);
        }
    }

    /// Tell the handler of `kind` a usage is gone
    pub(crate) fn notify_terminated(&self, kind: UsageKind, token: Option<&str>, handle: UsageHandle) {
        let key = token.map(event_key);
        let key = key.as_deref();
        match kind {
            UsageKind::ClientInviteSession | UsageKind::ServerInviteSession => {
                if let Some(h) = &self.invite_session {
                    h.on_terminated(handle);
                }
            }
            UsageKind::ClientRegistration => {
                if let Some(h) = &self.client_registration {
                    h.on_terminated(handle);
                }
            }
            UsageKind::ServerRegistration => {
                if let Some(h) = &self.server_registration {
                    h.on_terminated(handle);
                }
            }
            UsageKind::ClientSubscription => {
                if let Some(h) = key.and_then(|k| self.client_subscription.get(k)) {
                    h.on_terminated(handle);
                }
            }
            UsageKind::ServerSubscription => {
                if let Some(h) = key.and_then(|k| self.server_subscription.get(k)) {
                    h.on_terminated(handle);
                }
            }
            UsageKind::ClientPublication => {
                if let Some(h) = key.and_then(|k| self.client_publication.get(k)) {
                    h.on_terminated(handle);
                }
            }
            UsageKind::ServerPublication => {
                if let Some(h) = key.and_then(|k| self.server_publication.get(k)) {
                    h.on_terminated(handle);
                }
            }
            UsageKind::ClientOutOfDialogReq | UsageKind::ServerOutOfDialogReq => {
                if let Some(h) = self.out_of_dialog_for(token) {
                    h.on_terminated(handle);
                }
            }
        }
    }

    /// Tell the client handler of the creator's kind its request failed
    pub(crate) fn notify_failure(&self, creator: &BaseCreator, dialog_set: &DialogSetId, response: &Response) {
        let token = creator.handler_key();
        let key = token.map(event_key);
        let key = key.as_deref();
        match creator.usage_kind() {
            UsageKind::ClientInviteSession => {
                if let Some(h) = &self.invite_session {
                    h.on_failure(dialog_set, response);
                }
            }
            UsageKind::ClientRegistration => {
                if let Some(h) = &self.client_registration {
                    h.on_failure(dialog_set, response);
                }
            }
            UsageKind::ClientSubscription => {
                if let Some(h) = key.and_then(|k| self.client_subscription.get(k)) {
                    h.on_failure(dialog_set, response);
                }
            }
            UsageKind::ClientPublication => {
                if let Some(h) = key.and_then(|k| self.client_publication.get(k)) {
                    h.on_failure(dialog_set, response);
                }
            }
            _ => {
                if let Some(h) = self.out_of_dialog_for(token) {
                    h.on_failure(dialog_set, response);
                }
            }
        }
    }
}
