//! Usages: the logical exchanges living inside a dialog
//!
//! Every usage is owned by the manager's [`UsageRegistry`] and reached
//! through its [`UsageHandle`]. A dialog holds at most one usage per
//! [`UsageCategory`]. The behaviour implemented here is the part of each
//! exchange the manager needs to drive its lifecycle: answering in-dialog
//! requests that end it, refreshing on timers, terminating on failures.

pub mod handle;
pub mod invite_session;
pub mod out_of_dialog;
pub mod publication;
pub mod registration;
pub mod subscription;

pub use handle::{UsageHandle, UsageRegistry};
pub use invite_session::{ClientInviteSession, ServerInviteSession};
pub use out_of_dialog::{ClientOutOfDialogReq, ServerOutOfDialogReq};
pub use publication::{ClientPublication, ServerPublication};
pub use registration::{ClientRegistration, ServerRegistration};
pub use subscription::{ClientSubscription, ServerSubscription};

use std::any::Any;
use std::fmt;

use crate::creator::BaseCreator;
use crate::dialog::DialogId;
use crate::errors::{DumError, DumResult};
use crate::message::response_builders::create_response;
use crate::message::{Method, Request, Response, SipMessage, StatusCode};
use crate::transport::{DumTimer, DumTimerKind, Outbox};

/// Concrete usage types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageKind {
    ClientInviteSession,
    ServerInviteSession,
    ClientRegistration,
    ServerRegistration,
    ClientSubscription,
    ServerSubscription,
    ClientPublication,
    ServerPublication,
    ClientOutOfDialogReq,
    ServerOutOfDialogReq,
}

impl UsageKind {
    pub fn category(&self) -> UsageCategory {
        match self {
            UsageKind::ClientInviteSession | UsageKind::ServerInviteSession => UsageCategory::InviteSession,
            UsageKind::ClientRegistration | UsageKind::ServerRegistration => UsageCategory::Registration,
            UsageKind::ClientSubscription | UsageKind::ServerSubscription => UsageCategory::Subscription,
            UsageKind::ClientPublication | UsageKind::ServerPublication => UsageCategory::Publication,
            UsageKind::ClientOutOfDialogReq | UsageKind::ServerOutOfDialogReq => UsageCategory::OutOfDialog,
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(
            self,
            UsageKind::ClientInviteSession
                | UsageKind::ClientRegistration
                | UsageKind::ClientSubscription
                | UsageKind::ClientPublication
                | UsageKind::ClientOutOfDialogReq
        )
    }

    /// Server usage seeded by a request that opens a new dialog set
    ///
    /// Out-of-dialog INFO and NOTIFY are tolerated and handled like any other
    /// standalone request.
    pub fn server_for_initial(method: &Method) -> Option<UsageKind> {
        match method {
            Method::Invite => Some(UsageKind::ServerInviteSession),
            Method::Subscribe | Method::Refer => Some(UsageKind::ServerSubscription),
            Method::Register => Some(UsageKind::ServerRegistration),
            Method::Publish => Some(UsageKind::ServerPublication),
            Method::Message | Method::Options | Method::Info | Method::Notify => {
                Some(UsageKind::ServerOutOfDialogReq)
            }
            _ => None,
        }
    }

    /// Server usage seeded by an in-dialog request with no usage of its category yet
    pub fn server_in_dialog(method: &Method) -> Option<UsageKind> {
        match method {
            Method::Invite => Some(UsageKind::ServerInviteSession),
            Method::Subscribe | Method::Refer => Some(UsageKind::ServerSubscription),
            Method::Publish => Some(UsageKind::ServerPublication),
            Method::Message | Method::Options => Some(UsageKind::ServerOutOfDialogReq),
            _ => None,
        }
    }
}

impl fmt::Display for UsageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UsageKind::ClientInviteSession => "ClientInviteSession",
            UsageKind::ServerInviteSession => "ServerInviteSession",
            UsageKind::ClientRegistration => "ClientRegistration",
            UsageKind::ServerRegistration => "ServerRegistration",
            UsageKind::ClientSubscription => "ClientSubscription",
            UsageKind::ServerSubscription => "ServerSubscription",
            UsageKind::ClientPublication => "ClientPublication",
            UsageKind::ServerPublication => "ServerPublication",
            UsageKind::ClientOutOfDialogReq => "ClientOutOfDialogReq",
            UsageKind::ServerOutOfDialogReq => "ServerOutOfDialogReq",
        };
        f.write_str(name)
    }
}

/// Slot a usage occupies in its dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageCategory {
    InviteSession,
    Registration,
    Subscription,
    Publication,
    OutOfDialog,
}

impl UsageCategory {
    /// Category an in-dialog message with this (CSeq) method belongs to
    pub fn for_method(method: &Method) -> UsageCategory {
        match method {
            Method::Invite
            | Method::Ack
            | Method::Bye
            | Method::Cancel
            | Method::Prack
            | Method::Update
            | Method::Info => UsageCategory::InviteSession,
            Method::Subscribe | Method::Notify | Method::Refer => UsageCategory::Subscription,
            Method::Publish => UsageCategory::Publication,
            Method::Register => UsageCategory::Registration,
            _ => UsageCategory::OutOfDialog,
        }
    }
}

/// What the manager should do with a usage after it handled an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    Continue,
    Terminate,
}

/// Contract every usage fulfils towards the dialog usage manager
pub trait BaseUsage: Send + fmt::Debug {
    fn handle(&self) -> UsageHandle;

    fn kind(&self) -> UsageKind;

    /// Dialog the usage lives in
    fn dialog_id(&self) -> &DialogId;

    /// Event package or method name used to pick a handler
    fn handler_key(&self) -> Option<&str> {
        None
    }

    /// Handle an in-dialog request or a response to a request the usage sent
    fn dispatch(&mut self, message: &SipMessage, outbox: &mut Outbox) -> UsageOutcome;

    /// Handle a usage timer delivered by the stack
    fn dispatch_timer(&mut self, timer: &DumTimer, _outbox: &mut Outbox) -> UsageOutcome {
        match timer.kind {
            DumTimerKind::SessionExpired => UsageOutcome::Terminate,
            DumTimerKind::Refresh => UsageOutcome::Continue,
        }
    }

    /// Answer the request the usage is holding on behalf of the application
    fn respond(&mut self, status: StatusCode, _outbox: &mut Outbox) -> DumResult<UsageOutcome> {
        Err(DumError::invalid_state(format!(
            "{} cannot answer with {}",
            self.kind(),
            status
        )))
    }

    fn as_any(&self) -> &dyn Any;
}

/// Response from the server side of a dialog, stamped with our local tag
pub(crate) fn answer(request: &Request, status: StatusCode, local_tag: &str) -> Response {
    let response = create_response(request, status);
    if status == StatusCode::TRYING {
        response
    } else {
        response.with_to_tag(local_tag)
    }
}

/// Build a usage of the given kind
///
/// Client usages come from the dialog set's creator; server usages from the
/// request that created them.
pub(crate) fn build_usage(
    kind: UsageKind,
    handle: UsageHandle,
    dialog_id: DialogId,
    trigger: &SipMessage,
    creator: Option<&BaseCreator>,
) -> DumResult<Box<dyn BaseUsage>> {
    if kind.is_client() {
        let creator = creator.ok_or_else(|| DumError::CreatorNotFound {
            id: dialog_id.dialog_set_id().clone(),
        })?;
        let usage: Box<dyn BaseUsage> = match kind {
            UsageKind::ClientInviteSession => Box::new(ClientInviteSession::new(handle, dialog_id, creator)?),
            UsageKind::ClientRegistration => Box::new(ClientRegistration::new(handle, dialog_id, creator)?),
            UsageKind::ClientSubscription => Box::new(ClientSubscription::new(handle, dialog_id, creator)?),
            UsageKind::ClientPublication => Box::new(ClientPublication::new(handle, dialog_id, creator)?),
            _ => Box::new(ClientOutOfDialogReq::new(handle, dialog_id, creator)?),
        };
        return Ok(usage);
    }

    let request = trigger
        .as_request()
        .ok_or_else(|| DumError::protocol(format!("{} must be created from a request", kind)))?;
    let usage: Box<dyn BaseUsage> = match kind {
        UsageKind::ServerInviteSession => Box::new(ServerInviteSession::new(handle, dialog_id, request)?),
        UsageKind::ServerRegistration => Box::new(ServerRegistration::new(handle, dialog_id, request)),
        UsageKind::ServerSubscription => Box::new(ServerSubscription::new(handle, dialog_id, request)?),
        UsageKind::ServerPublication => Box::new(ServerPublication::new(handle, dialog_id, request)?),
        _ => Box::new(ServerOutOfDialogReq::new(handle, dialog_id, request.clone())),
    };
    Ok(usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_follow_cseq_method() {
        assert_eq!(UsageCategory::for_method(&Method::Bye), UsageCategory::InviteSession);
        assert_eq!(UsageCategory::for_method(&Method::Notify), UsageCategory::Subscription);
        assert_eq!(UsageCategory::for_method(&Method::Register), UsageCategory::Registration);
        assert_eq!(UsageCategory::for_method(&Method::Options), UsageCategory::OutOfDialog);
        assert_eq!(UsageKind::ClientPublication.category(), UsageCategory::Publication);
    }

    #[test]
    fn test_server_kinds_for_requests() {
        assert_eq!(UsageKind::server_for_initial(&Method::Refer), Some(UsageKind::ServerSubscription));
        assert_eq!(UsageKind::server_for_initial(&Method::Notify), Some(UsageKind::ServerOutOfDialogReq));
        assert_eq!(UsageKind::server_for_initial(&Method::Bye), None);
        assert_eq!(UsageKind::server_in_dialog(&Method::Notify), None);
        assert!(!UsageKind::ServerInviteSession.is_client());
    }
}
