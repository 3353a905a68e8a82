//! A single dialog inside a dialog set

use std::collections::HashMap;

use tracing::debug;

use super::DialogId;
use crate::message::{HeaderAccess, Method, Request, Response, Uri};
use crate::usage::{UsageCategory, UsageHandle};

/// Dialog state per RFC 3261 Section 12
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Early,
    Confirmed,
    Terminated,
}

/// One dialog and the handles of the usages living in it
#[derive(Debug)]
pub struct Dialog {
    id: DialogId,
    state: DialogState,
    remote_cseq: Option<u32>,
    remote_target: Option<Uri>,
    usages: HashMap<UsageCategory, UsageHandle>,
}

impl Dialog {
    pub fn new(id: DialogId) -> Self {
        Self {
            id,
            state: DialogState::Early,
            remote_cseq: None,
            remote_target: None,
            usages: HashMap::new(),
        }
    }

    /// Server side: dialog created by an inbound request
    pub fn from_request(id: DialogId, request: &Request) -> Self {
        let mut dialog = Self::new(id);
        dialog.remote_cseq = request.cseq().map(|c| c.seq);
        dialog.remote_target = request.contact().map(|c| c.uri.clone());
        dialog
    }

    /// Client side: dialog created by a tagged response
    pub fn from_response(id: DialogId, response: &Response) -> Self {
        let mut dialog = Self::new(id);
        dialog.remote_target = response.contact().map(|c| c.uri.clone());
        if response.status().is_success() {
            dialog.state = DialogState::Confirmed;
        }
        dialog
    }

    pub fn id(&self) -> &DialogId {
        &self.id
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn confirm(&mut self) {
        if self.state == DialogState::Early {
            self.state = DialogState::Confirmed;
        }
    }

    pub fn remote_target(&self) -> Option<&Uri> {
        self.remote_target.as_ref()
    }

    /// Track the peer's CSeq; false when the request is out of order
    ///
    /// ACK and CANCEL reuse the CSeq number of the INVITE they belong to.
    pub fn accept_remote_cseq(&mut self, request: &Request) -> bool {
        if matches!(request.method, Method::Ack | Method::Cancel) {
            return true;
        }
        let Some(seq) = request.cseq().map(|c| c.seq) else {
            return true;
        };
        match self.remote_cseq {
            Some(last) if seq < last => {
                debug!("Dialog {} rejecting CSeq {} below {}", self.id, seq, last);
                false
            }
            _ => {
                self.remote_cseq = Some(seq);
                if let Some(contact) = request.contact() {
                    self.remote_target = Some(contact.uri.clone());
                }
                true
            }
        }
    }

    pub fn usage(&self, category: UsageCategory) -> Option<UsageHandle> {
        self.usages.get(&category).copied()
    }

    pub fn set_usage(&mut self, category: UsageCategory, handle: UsageHandle) {
        self.usages.insert(category, handle);
    }

    /// Forget a usage; true when it was held by this dialog
    pub fn remove_usage(&mut self, handle: UsageHandle) -> bool {
        let before = self.usages.len();
        self.usages.retain(|_, h| *h != handle);
        let removed = self.usages.len() != before;
        if self.usages.is_empty() {
            self.state = DialogState::Terminated;
        }
        removed
    }

    pub fn usage_handles(&self) -> Vec<UsageHandle> {
        self.usages.values().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.usages.is_empty()
    }
}
