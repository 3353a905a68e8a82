//! Dialog sets
//!
//! A dialog set collects every dialog that grows out of one initial request.
//! On the client side it also keeps the pending [`BaseCreator`] until the
//! first final response; on the server side it remembers the transaction
//! identity of the initial request so forked copies arriving over a second
//! path can be detected (RFC 3261 Section 8.2.2.2).

use std::collections::HashMap;

use super::{Dialog, DialogId, DialogSetId};
use crate::creator::BaseCreator;
use crate::errors::{DumError, DumResult};
use crate::message::{HeaderAccess, Method, Request};
use crate::usage::{UsageCategory, UsageHandle};

/// Transaction identity of the request that created a server dialog set
#[derive(Debug, Clone, PartialEq, Eq)]
struct MergeKey {
    seq: u32,
    method: Method,
    branch: String,
}

/// All dialogs sharing a Call-ID and local tag
#[derive(Debug)]
pub struct DialogSet {
    id: DialogSetId,
    dialogs: HashMap<DialogId, Dialog>,
    creator: Option<BaseCreator>,
    merge_key: Option<MergeKey>,
}

impl DialogSet {
    /// Server side: a set seeded by an inbound request
    ///
    /// Fails with a protocol error when the request lacks what every later
    /// step relies on: CSeq, a branch on the top Via, a From tag.
    pub fn from_request(id: DialogSetId, request: &Request) -> DumResult<Self> {
        let cseq = request
            .cseq()
            .ok_or_else(|| DumError::protocol("Missing CSeq header"))?;
        if cseq.method != request.method {
            return Err(DumError::protocol(format!(
                "CSeq method {} does not match {}",
                cseq.method, request.method
            )));
        }
        let branch = request
            .top_via()
            .and_then(|via| via.branch())
            .filter(|branch| !branch.is_empty())
            .ok_or_else(|| DumError::protocol("Missing Via branch"))?;
        DialogId::from_request(request)?;

        Ok(Self {
            id,
            dialogs: HashMap::new(),
            creator: None,
            merge_key: Some(MergeKey {
                seq: cseq.seq,
                method: cseq.method.clone(),
                branch: branch.to_string(),
            }),
        })
    }

    /// Client side: a set waiting for responses to the creator's request
    pub fn from_creator(id: DialogSetId, creator: BaseCreator) -> Self {
        Self {
            id,
            dialogs: HashMap::new(),
            creator: Some(creator),
            merge_key: None,
        }
    }

    pub fn id(&self) -> &DialogSetId {
        &self.id
    }

    pub fn creator(&self) -> Option<&BaseCreator> {
        self.creator.as_ref()
    }

    pub fn creator_mut(&mut self) -> Option<&mut BaseCreator> {
        self.creator.as_mut()
    }

    /// Drop the creator once its request got a final response
    pub fn release_creator(&mut self) -> Option<BaseCreator> {
        self.creator.take()
    }

    /// True when `request` is a copy of our initial request that reached us
    /// over a different path: same CSeq and method, different branch
    pub fn is_merged(&self, request: &Request) -> bool {
        let Some(key) = &self.merge_key else {
            return false;
        };
        let (Some(cseq), Some(branch)) = (request.cseq(), request.top_via().and_then(|v| v.branch())) else {
            return false;
        };
        cseq.seq == key.seq && cseq.method == key.method && branch != key.branch
    }

    pub fn find_dialog(&self, id: &DialogId) -> Option<&Dialog> {
        self.dialogs.get(id)
    }

    pub fn find_dialog_mut(&mut self, id: &DialogId) -> Option<&mut Dialog> {
        self.dialogs.get_mut(id)
    }

    pub fn add_dialog(&mut self, dialog: Dialog) -> DumResult<()> {
        if dialog.id().dialog_set_id() != &self.id {
            return Err(DumError::invalid_state(format!(
                "Dialog {} does not belong to set {}",
                dialog.id(),
                self.id
            )));
        }
        if self.dialogs.contains_key(dialog.id()) {
            return Err(DumError::invalid_state(format!("Dialog {} already exists", dialog.id())));
        }
        self.dialogs.insert(dialog.id().clone(), dialog);
        Ok(())
    }

    /// Remove a dialog that holds no usage
    pub fn remove_dialog_if_empty(&mut self, id: &DialogId) -> bool {
        if self.dialogs.get(id).map(Dialog::is_empty).unwrap_or(false) {
            self.dialogs.remove(id);
            true
        } else {
            false
        }
    }

    /// Forget a destroyed usage, removing its dialog when nothing else lives there
    ///
    /// Returns true when the dialog was removed.
    pub fn remove_usage(&mut self, id: &DialogId, handle: UsageHandle) -> bool {
        if let Some(dialog) = self.dialogs.get_mut(id) {
            dialog.remove_usage(handle);
        }
        self.remove_dialog_if_empty(id)
    }

    /// Usage that should see a response of the given category
    ///
    /// Registrars may put a fresh To tag on every response, so a registration
    /// response falls back to whichever dialog holds the registration.
    pub fn usage_for_response(&self, id: &DialogId, category: UsageCategory) -> Option<UsageHandle> {
        if let Some(handle) = self.dialogs.get(id).and_then(|d| d.usage(category)) {
            return Some(handle);
        }
        if category == UsageCategory::Registration {
            return self.dialogs.values().find_map(|d| d.usage(category));
        }
        None
    }

    /// Handles of every INVITE session in the set
    pub fn invite_sessions(&self) -> Vec<UsageHandle> {
        self.dialogs
            .values()
            .filter_map(|d| d.usage(UsageCategory::InviteSession))
            .collect()
    }

    /// Handles of every usage in every dialog
    pub fn usage_handles(&self) -> Vec<UsageHandle> {
        self.dialogs.values().flat_map(|d| d.usage_handles()).collect()
    }

    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }

    pub fn dialogs(&self) -> impl Iterator<Item = &Dialog> {
        self.dialogs.values()
    }

    /// No dialogs and no request still waiting for a response
    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty() && self.creator.is_none()
    }
}
