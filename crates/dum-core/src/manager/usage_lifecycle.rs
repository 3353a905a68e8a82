//! Usage creation, resolution and destruction
//!
//! Usages are reached only through their [`UsageHandle`]. Destroying a usage
//! cascades: the dialog goes when its last usage goes, and the dialog set
//! goes when it has neither dialogs nor a pending request.

use tracing::{debug, info};

use super::core::DialogUsageManager;
use crate::dialog::DialogId;
use crate::errors::{DumError, DumResult};
use crate::message::SipMessage;
use crate::usage::{build_usage, BaseUsage, UsageHandle, UsageKind};

impl DialogUsageManager {
    /// Create a usage of `kind` inside an existing dialog
    ///
    /// Client kinds are built from the dialog set's creator, server kinds
    /// from `trigger`, which must then be a request. The handler registered
    /// for the kind is told about the new usage.
    pub fn create_usage(&mut self, kind: UsageKind, dialog_id: &DialogId, trigger: &SipMessage) -> DumResult<UsageHandle> {
        let set_id = dialog_id.dialog_set_id();
        let set = self.find_dialog_set(set_id)?;
        let dialog = set
            .find_dialog(dialog_id)
            .ok_or_else(|| DumError::DialogNotFound { id: dialog_id.clone() })?;

        let category = kind.category();
        if let Some(existing) = dialog.usage(category) {
            return Err(DumError::invalid_state(format!(
                "Dialog {} already holds usage {} for {:?}",
                dialog_id, existing, category
            )));
        }
        let creator = if kind.is_client() {
            Some(
                set.creator()
                    .cloned()
                    .ok_or_else(|| DumError::CreatorNotFound { id: set_id.clone() })?,
            )
        } else {
            None
        };

        let handle = self.usages.allocate_handle();
        let usage = build_usage(kind, handle, dialog_id.clone(), trigger, creator.as_ref())?;
        let key = usage.handler_key().map(str::to_string);
        self.usages.insert(usage)?;
        if let Some(dialog) = self
            .dialog_sets
            .get_mut(set_id)
            .and_then(|set| set.find_dialog_mut(dialog_id))
        {
            dialog.set_usage(category, handle);
        }

        info!("Created {} {} in dialog {}", kind, handle, dialog_id);
        self.handlers.notify_new(kind, key.as_deref(), handle, trigger);
        Ok(handle)
    }

    /// Destroy a usage and whatever it leaves empty
    ///
    /// Returns false when the handle was already gone.
    pub fn destroy_usage(&mut self, handle: UsageHandle) -> bool {
        let Some(usage) = self.usages.remove(handle) else {
            return false;
        };
        let kind = usage.kind();
        let dialog_id = usage.dialog_id().clone();
        info!("Destroying {} {} in dialog {}", kind, handle, dialog_id);
        self.handlers.notify_terminated(kind, usage.handler_key(), handle);

        if let Some(set) = self.dialog_sets.get_mut(dialog_id.dialog_set_id()) {
            if set.remove_usage(&dialog_id, handle) {
                debug!("Dialog {} removed", dialog_id);
            }
        }
        self.reap_dialog_set(dialog_id.dialog_set_id());
        true
    }

    /// True while `handle` names a live usage
    pub fn is_valid(&self, handle: UsageHandle) -> bool {
        self.usages.contains(handle)
    }

    pub fn get_usage(&self, handle: UsageHandle) -> DumResult<&dyn BaseUsage> {
        self.usages.get(handle)
    }

    pub fn get_usage_mut(&mut self, handle: UsageHandle) -> DumResult<&mut dyn BaseUsage> {
        self.usages.get_mut(handle)
    }

    /// Resolve a handle to its concrete usage type
    pub fn usage_as<T: BaseUsage + 'static>(&self, handle: UsageHandle) -> DumResult<&T> {
        let usage = self.usages.get(handle)?;
        let kind = usage.kind();
        usage.as_any().downcast_ref::<T>().ok_or_else(|| {
            DumError::invalid_state(format!(
                "Usage {} is a {}, not a {}",
                handle,
                kind,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Number of live usages
    pub fn usage_count(&self) -> usize {
        self.usages.len()
    }

    /// Handles of every live usage
    pub fn usage_handles(&self) -> Vec<UsageHandle> {
        self.usages.handles()
    }
}
