//! Usage handles and the handle registry
//!
//! Application code never owns a usage. It holds a [`UsageHandle`], and every
//! access goes through the registry, which answers with
//! [`DumError::StaleHandle`] once the usage is gone. Handles come from a
//! monotonically increasing counter and are never reused, so a stale handle
//! can never alias a newer usage.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BaseUsage;
use crate::errors::{DumError, DumResult};

/// Opaque reference to a usage owned by the dialog usage manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsageHandle(u64);

impl UsageHandle {
    /// Rebuild a handle from its numeric id
    pub fn from_raw(id: u64) -> Self {
        UsageHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UsageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle → usage arena
#[derive(Debug)]
pub struct UsageRegistry {
    usages: HashMap<UsageHandle, Box<dyn BaseUsage>>,
    next_id: u64,
}

impl UsageRegistry {
    pub fn new() -> Self {
        Self {
            usages: HashMap::new(),
            next_id: 1,
        }
    }

    /// Reserve the next handle
    pub fn allocate_handle(&mut self) -> UsageHandle {
        let handle = UsageHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    /// Register a usage under the handle it was built with
    pub fn insert(&mut self, usage: Box<dyn BaseUsage>) -> DumResult<UsageHandle> {
        let handle = usage.handle();
        if self.usages.contains_key(&handle) {
            return Err(DumError::UsageExists { handle });
        }
        self.usages.insert(handle, usage);
        Ok(handle)
    }

    pub fn contains(&self, handle: UsageHandle) -> bool {
        self.usages.contains_key(&handle)
    }

    pub fn get(&self, handle: UsageHandle) -> DumResult<&dyn BaseUsage> {
        match self.usages.get(&handle) {
            Some(usage) => Ok(&**usage),
            None => Err(DumError::StaleHandle { handle }),
        }
    }

    pub fn get_mut(&mut self, handle: UsageHandle) -> DumResult<&mut dyn BaseUsage> {
        match self.usages.get_mut(&handle) {
            Some(usage) => Ok(&mut **usage),
            None => Err(DumError::StaleHandle { handle }),
        }
    }

    /// Unregister a usage and hand it back to the caller, which drops it
    pub fn remove(&mut self, handle: UsageHandle) -> Option<Box<dyn BaseUsage>> {
        let removed = self.usages.remove(&handle);
        if removed.is_none() {
            debug!("Usage {} already removed", handle);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.usages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usages.is_empty()
    }

    /// Handles of every live usage
    pub fn handles(&self) -> Vec<UsageHandle> {
        self.usages.keys().copied().collect()
    }
}
