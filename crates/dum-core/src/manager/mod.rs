//! Dialog Usage Manager
//!
//! [`DialogUsageManager`] is the single owner of every dialog set, dialog
//! and usage. Its implementation is split by concern:
//!
//! - [`core`]: construction, configuration, handler wiring and the event loop
//! - [`message_routing`]: admission and demultiplexing of inbound events
//! - [`usage_lifecycle`]: creating, resolving and destroying usages
//! - [`dialog_lookup`]: dialog set, dialog and creator lookup
//! - [`outbound`]: requests and responses the application originates

pub mod core;
pub mod dialog_lookup;
pub mod message_routing;
pub mod outbound;
pub mod usage_lifecycle;

pub use self::core::DialogUsageManager;
