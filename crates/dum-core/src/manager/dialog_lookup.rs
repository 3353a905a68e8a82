//! Dialog set, dialog and creator lookup

use tracing::debug;

use super::core::DialogUsageManager;
use crate::creator::BaseCreator;
use crate::dialog::{Dialog, DialogId, DialogSet, DialogSetId};
use crate::errors::{DumError, DumResult};

impl DialogUsageManager {
    pub fn find_dialog_set(&self, id: &DialogSetId) -> DumResult<&DialogSet> {
        self.dialog_sets
            .get(id)
            .ok_or_else(|| DumError::DialogSetNotFound { id: id.clone() })
    }

    pub fn find_dialog_set_mut(&mut self, id: &DialogSetId) -> DumResult<&mut DialogSet> {
        self.dialog_sets
            .get_mut(id)
            .ok_or_else(|| DumError::DialogSetNotFound { id: id.clone() })
    }

    pub fn find_dialog(&self, id: &DialogId) -> DumResult<&Dialog> {
        self.find_dialog_set(id.dialog_set_id())?
            .find_dialog(id)
            .ok_or_else(|| DumError::DialogNotFound { id: id.clone() })
    }

    /// Pending request of the dialog set the dialog belongs to
    pub fn find_creator(&self, id: &DialogId) -> DumResult<&BaseCreator> {
        let set_id = id.dialog_set_id();
        self.find_dialog_set(set_id)?
            .creator()
            .ok_or_else(|| DumError::CreatorNotFound { id: set_id.clone() })
    }

    pub fn dialog_set_count(&self) -> usize {
        self.dialog_sets.len()
    }

    pub fn dialog_set_ids(&self) -> Vec<DialogSetId> {
        self.dialog_sets.keys().cloned().collect()
    }

    pub(crate) fn insert_dialog_set(&mut self, set: DialogSet) -> DumResult<()> {
        let id = set.id().clone();
        if self.dialog_sets.contains_key(&id) {
            return Err(DumError::DialogSetExists { id });
        }
        debug!("Dialog set {} added", id);
        self.dialog_sets.insert(id, set);
        Ok(())
    }

    /// Remove a dialog set once it has no dialogs and no pending request
    pub(crate) fn reap_dialog_set(&mut self, id: &DialogSetId) -> bool {
        if self.dialog_sets.get(id).map(DialogSet::is_empty).unwrap_or(false) {
            self.dialog_sets.remove(id);
            debug!("Dialog set {} removed", id);
            true
        } else {
            false
        }
    }

    /// Remove a half-built dialog set together with any usage it holds
    pub(crate) fn discard_dialog_set(&mut self, id: &DialogSetId) {
        if let Some(set) = self.dialog_sets.remove(id) {
            for handle in set.usage_handles() {
                self.usages.remove(handle);
            }
            debug!("Dialog set {} discarded", id);
        }
    }
}
