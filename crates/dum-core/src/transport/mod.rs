//! Transport/transaction layer boundary
//!
//! The dialog usage manager sits on top of a SIP stack that owns sockets,
//! transactions and retransmission timers. This module defines what the
//! manager needs from it ([`SipStack`]), the closed set of things it can
//! deliver upward ([`DumEvent`]), and [`ChannelStack`], an in-memory stack
//! backed by tokio channels that applications and tests can drive directly.
//!
//! ```text
//! application
//!      ↓ UsageHandle / Request
//! DialogUsageManager  ← dum-core
//!      ↓ SipStack::send / ↑ SipStack::receive
//! transaction + transport layer
//! ```

pub mod channel;

pub use channel::{ChannelStack, ChannelStackHandle};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DumResult;
use crate::message::{Request, Response, SipMessage};
use crate::usage::UsageHandle;

/// Services the dialog usage manager consumes from the stack below
#[async_trait]
pub trait SipStack: Send {
    /// Hand an outbound request or response to the transaction layer
    async fn send(&mut self, message: SipMessage) -> DumResult<()>;

    /// Pump I/O until at least one inbound event is ready
    async fn process(&mut self) -> DumResult<()>;

    /// Next classified inbound event, if any
    fn receive(&mut self) -> Option<DumEvent>;
}

/// Everything the stack can deliver to the dialog usage manager
#[derive(Debug, Clone, PartialEq)]
pub enum DumEvent {
    Request(Request),
    Response(Response),
    Timer(DumTimer),
}

impl From<SipMessage> for DumEvent {
    fn from(message: SipMessage) -> Self {
        match message {
            SipMessage::Request(request) => DumEvent::Request(request),
            SipMessage::Response(response) => DumEvent::Response(response),
        }
    }
}

/// Usage-level timers scheduled by the stack on behalf of a usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DumTimerKind {
    /// Time to refresh a registration, subscription or publication
    Refresh,
    /// The usage outlived its negotiated lifetime
    SessionExpired,
}

/// A timer addressed to one usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumTimer {
    pub handle: UsageHandle,
    pub kind: DumTimerKind,
}

impl DumTimer {
    pub fn new(handle: UsageHandle, kind: DumTimerKind) -> Self {
        Self { handle, kind }
    }
}

/// Outbound messages produced while one event is processed
///
/// Flushed to the stack once processing of that event completes.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<SipMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<SipMessage>) {
        self.messages.push(message.into());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn drain(&mut self) -> Vec<SipMessage> {
        std::mem::take(&mut self.messages)
    }
}
