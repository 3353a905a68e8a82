//! # RVoIP Dialog Usage Manager Core
//!
//! The layer between a SIP transaction stack and application logic. Every
//! inbound request, response and usage timer passes through a single
//! [`DialogUsageManager`], which admits or rejects it, finds the dialog set
//! and dialog it belongs to, and hands it to the usage living there.
//!
//! ## Architecture
//!
//! ```text
//! DialogUsageManager
//!  ├── DialogSet (Call-ID + local tag)
//!  │    ├── BaseCreator        pending initial request (client side)
//!  │    └── Dialog (+ remote tag)
//!  │         └── UsageHandle per category ──┐
//!  └── UsageRegistry  ◄─────────────────────┘
//!       └── Box<dyn BaseUsage>: invite session, registration,
//!           subscription, publication, out-of-dialog request
//! ```
//!
//! Applications hold [`UsageHandle`]s, never references. A handle whose
//! usage is gone resolves to [`DumError::StaleHandle`].
//!
//! ## Modules
//!
//! - `manager`: the dispatcher and its public API
//! - `validation`: admission checks (416, 405, 420, 415, 404)
//! - `dialog`: identifiers, dialogs and dialog sets
//! - `usage`: usage kinds, the handle registry and the usage types
//! - `creator`: pending outbound dialog-creating requests
//! - `handler`: application callbacks keyed by kind, event package or method
//! - `profile`: supported capabilities
//! - `auth`: optional client and server authentication hooks
//! - `transport`: the seam to the transaction layer and an in-memory stack
//! - `message`: parsed SIP messages and builders
//! - `config`: serde-loadable configuration
//! - `errors`: error types
//!
//! ## Example
//!
//! ```no_run
//! use rvoip_dum_core::{ChannelStack, DialogUsageManager, DumConfig};
//!
//! # async fn example() -> rvoip_dum_core::DumResult<()> {
//! let (stack, _handle) = ChannelStack::new();
//! let config = DumConfig::new("sip:alice@example.com".parse()?, "sip:alice@192.0.2.10:5060".parse()?);
//! let mut dum = DialogUsageManager::with_config(stack, config)?;
//!
//! let register = dum.make_registration("sip:alice@example.com".parse()?)?;
//! dum.send(register).await?;
//! dum.run().await
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod creator;
pub mod dialog;
pub mod errors;
pub mod handler;
pub mod manager;
pub mod message;
pub mod profile;
pub mod transport;
pub mod usage;
pub mod validation;

pub use auth::{ClientAuthManager, RedirectManager, ServerAuthManager};
pub use config::DumConfig;
pub use creator::{BaseCreator, CreatorKind};
pub use dialog::{Dialog, DialogId, DialogSet, DialogSetId, DialogState};
pub use errors::{DumError, DumResult};
pub use handler::{
    ClientPublicationHandler, ClientRegistrationHandler, ClientSubscriptionHandler, HandlerRegistry,
    InviteSessionHandler, OutOfDialogHandler, ServerPublicationHandler, ServerRegistrationHandler,
    ServerSubscriptionHandler,
};
pub use manager::DialogUsageManager;
pub use message::{Method, Request, Response, SipMessage, StatusCode, Uri};
pub use profile::{MasterProfile, Profile};
pub use transport::{ChannelStack, ChannelStackHandle, DumEvent, DumTimer, DumTimerKind, SipStack};
pub use usage::{BaseUsage, UsageCategory, UsageHandle, UsageKind, UsageOutcome};
