//! In-memory SIP stack over tokio channels

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use super::{DumEvent, SipStack};
use crate::errors::{DumError, DumResult};
use crate::message::{Request, Response, SipMessage};

/// A [`SipStack`] whose wire is a pair of unbounded channels
pub struct ChannelStack {
    inbound_rx: mpsc::UnboundedReceiver<DumEvent>,
    outbound_tx: mpsc::UnboundedSender<SipMessage>,
    pending: VecDeque<DumEvent>,
}

/// The far end of a [`ChannelStack`]: injects inbound events, observes sends
pub struct ChannelStackHandle {
    inbound_tx: mpsc::UnboundedSender<DumEvent>,
    outbound_rx: mpsc::UnboundedReceiver<SipMessage>,
}

impl ChannelStack {
    pub fn new() -> (ChannelStack, ChannelStackHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            ChannelStack {
                inbound_rx,
                outbound_tx,
                pending: VecDeque::new(),
            },
            ChannelStackHandle {
                inbound_tx,
                outbound_rx,
            },
        )
    }
}

#[async_trait]
impl SipStack for ChannelStack {
    async fn send(&mut self, message: SipMessage) -> DumResult<()> {
        trace!("ChannelStack sending {}", message.brief());
        self.outbound_tx
            .send(message)
            .map_err(|_| DumError::transport("Outbound channel closed"))
    }

    async fn process(&mut self) -> DumResult<()> {
        if !self.pending.is_empty() {
            return Ok(());
        }
        match self.inbound_rx.recv().await {
            Some(event) => {
                self.pending.push_back(event);
                while let Ok(event) = self.inbound_rx.try_recv() {
                    self.pending.push_back(event);
                }
                Ok(())
            }
            None => Err(DumError::transport("Inbound channel closed")),
        }
    }

    fn receive(&mut self) -> Option<DumEvent> {
        self.pending.pop_front()
    }
}

impl ChannelStackHandle {
    /// Deliver an event to the stack as if it came off the wire
    pub fn inject(&self, event: DumEvent) -> DumResult<()> {
        self.inbound_tx
            .send(event)
            .map_err(|_| DumError::transport("Inbound channel closed"))
    }

    pub fn inject_request(&self, request: Request) -> DumResult<()> {
        self.inject(DumEvent::Request(request))
    }

    pub fn inject_response(&self, response: Response) -> DumResult<()> {
        self.inject(DumEvent::Response(response))
    }

    /// Next message the manager sent, without waiting
    pub fn try_next_sent(&mut self) -> Option<SipMessage> {
        self.outbound_rx.try_recv().ok()
    }

    /// Wait for the next message the manager sends
    pub async fn next_sent(&mut self) -> Option<SipMessage> {
        self.outbound_rx.recv().await
    }

    /// Everything sent so far
    pub fn drain_sent(&mut self) -> Vec<SipMessage> {
        let mut sent = Vec::new();
        while let Ok(message) = self.outbound_rx.try_recv() {
            sent.push(message);
        }
        sent
    }
}
