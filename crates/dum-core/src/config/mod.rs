//! Dialog usage manager configuration
//!
//! Everything here can come from a JSON document; fields left out keep
//! their defaults.
//!
//! ```json
//! {
//!   "identity": "sip:alice@example.com",
//!   "contact": "sip:alice@192.0.2.10:5060",
//!   "user_agent": "rvoip-dum/0.1",
//!   "registration_expiry": 600,
//!   "profile": { "option_tags": ["timer"] }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{DumError, DumResult};
use crate::message::Uri;
use crate::profile::MasterProfile;

/// Default Expires for outbound REGISTER, in seconds
pub const DEFAULT_REGISTRATION_EXPIRY: u32 = 3600;
/// Default Expires for outbound SUBSCRIBE, in seconds
pub const DEFAULT_SUBSCRIPTION_EXPIRY: u32 = 3600;
/// Default Expires for outbound PUBLISH, in seconds
pub const DEFAULT_PUBLICATION_EXPIRY: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumConfig {
    /// Capabilities used for admission checks and outbound Supported/Allow
    pub profile: MasterProfile,
    /// Our address of record, placed in From of requests we originate
    pub identity: Uri,
    /// Where peers reach us, placed in Contact
    pub contact: Uri,
    /// User-Agent for requests we originate
    pub user_agent: Option<String>,
    pub registration_expiry: u32,
    pub subscription_expiry: u32,
    pub publication_expiry: u32,
}

impl Default for DumConfig {
    fn default() -> Self {
        Self {
            profile: MasterProfile::default(),
            identity: Uri::new("sip", "localhost").with_user("anonymous"),
            contact: Uri::new("sip", "127.0.0.1").with_port(5060),
            user_agent: None,
            registration_expiry: DEFAULT_REGISTRATION_EXPIRY,
            subscription_expiry: DEFAULT_SUBSCRIPTION_EXPIRY,
            publication_expiry: DEFAULT_PUBLICATION_EXPIRY,
        }
    }
}

impl DumConfig {
    pub fn new(identity: Uri, contact: Uri) -> Self {
        Self {
            identity,
            contact,
            ..Default::default()
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> DumResult<Self> {
        let config: DumConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> DumResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> DumResult<()> {
        if self.identity.user.is_none() {
            return Err(DumError::config(format!("identity {} has no user part", self.identity)));
        }
        for uri in [&self.identity, &self.contact] {
            if !self.profile.schemes.iter().any(|s| s.eq_ignore_ascii_case(&uri.scheme)) {
                return Err(DumError::config(format!("{} uses a scheme the profile does not support", uri)));
            }
        }
        if self.registration_expiry == 0 {
            return Err(DumError::config("registration_expiry must be greater than zero"));
        }
        if self.subscription_expiry == 0 {
            return Err(DumError::config("subscription_expiry must be greater than zero"));
        }
        if self.publication_expiry == 0 {
            return Err(DumError::config("publication_expiry must be greater than zero"));
        }
        if self.profile.methods.is_empty() {
            return Err(DumError::config("profile must allow at least one method"));
        }
        Ok(())
    }
}
