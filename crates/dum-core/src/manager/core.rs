//! Core DialogUsageManager implementation
//!
//! Holds the state and the event loop. Every inbound event is processed to
//! completion, including sending whatever it produced, before the next one
//! is taken from the stack.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{ClientAuthManager, RedirectManager, ServerAuthManager};
use crate::config::DumConfig;
use crate::dialog::{DialogSet, DialogSetId};
use crate::errors::DumResult;
use crate::handler::{
    ClientPublicationHandler, ClientRegistrationHandler, ClientSubscriptionHandler, HandlerRegistry,
    InviteSessionHandler, OutOfDialogHandler, ServerPublicationHandler, ServerRegistrationHandler,
    ServerSubscriptionHandler,
};
use crate::message::Method;
use crate::profile::Profile;
use crate::transport::{DumEvent, Outbox, SipStack};
use crate::usage::UsageRegistry;

/// Demultiplexes SIP traffic into dialog sets, dialogs and usages
pub struct DialogUsageManager {
    pub(crate) stack: Box<dyn SipStack>,
    pub(crate) config: DumConfig,
    pub(crate) profile: Arc<dyn Profile>,
    pub(crate) client_auth: Option<Box<dyn ClientAuthManager>>,
    pub(crate) server_auth: Option<Box<dyn ServerAuthManager>>,
    pub(crate) redirect: Option<Box<dyn RedirectManager>>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) dialog_sets: HashMap<DialogSetId, DialogSet>,
    pub(crate) usages: UsageRegistry,
}

impl DialogUsageManager {
    /// Create a manager with the default configuration
    pub fn new(stack: impl SipStack + 'static) -> Self {
        let config = DumConfig::default();
        let profile: Arc<dyn Profile> = Arc::new(config.profile.clone());
        Self {
            stack: Box::new(stack),
            config,
            profile,
            client_auth: None,
            server_auth: None,
            redirect: None,
            handlers: HandlerRegistry::new(),
            dialog_sets: HashMap::new(),
            usages: UsageRegistry::new(),
        }
    }

    /// Create a manager from a validated configuration
    ///
    /// The configuration's profile becomes the active [`Profile`].
    pub fn with_config(stack: impl SipStack + 'static, config: DumConfig) -> DumResult<Self> {
        config.validate()?;
        let mut manager = Self::new(stack);
        manager.profile = Arc::new(config.profile.clone());
        manager.config = config;
        info!("DialogUsageManager configured for {}", manager.config.identity);
        Ok(manager)
    }

    pub fn config(&self) -> &DumConfig {
        &self.config
    }

    pub fn profile(&self) -> &dyn Profile {
        self.profile.as_ref()
    }

    /// Replace the capability profile used for admission and outbound requests
    pub fn set_profile(&mut self, profile: Arc<dyn Profile>) {
        self.profile = profile;
    }

    pub fn set_client_auth_manager(&mut self, manager: Box<dyn ClientAuthManager>) {
        self.client_auth = Some(manager);
    }

    pub fn set_server_auth_manager(&mut self, manager: Box<dyn ServerAuthManager>) {
        self.server_auth = Some(manager);
    }

    pub fn set_redirect_manager(&mut self, manager: Box<dyn RedirectManager>) {
        self.redirect = Some(manager);
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    pub fn set_invite_session_handler(&mut self, handler: Arc<dyn InviteSessionHandler>) {
        self.handlers.set_invite_session_handler(handler);
    }

    pub fn set_client_registration_handler(&mut self, handler: Arc<dyn ClientRegistrationHandler>) {
        self.handlers.set_client_registration_handler(handler);
    }

    pub fn set_server_registration_handler(&mut self, handler: Arc<dyn ServerRegistrationHandler>) {
        self.handlers.set_server_registration_handler(handler);
    }

    pub fn add_client_subscription_handler(&mut self, event: &str, handler: Arc<dyn ClientSubscriptionHandler>) {
        self.handlers.add_client_subscription_handler(event, handler);
    }

    pub fn add_server_subscription_handler(&mut self, event: &str, handler: Arc<dyn ServerSubscriptionHandler>) {
        self.handlers.add_server_subscription_handler(event, handler);
    }

    pub fn add_client_publication_handler(&mut self, event: &str, handler: Arc<dyn ClientPublicationHandler>) {
        self.handlers.add_client_publication_handler(event, handler);
    }

    pub fn add_server_publication_handler(&mut self, event: &str, handler: Arc<dyn ServerPublicationHandler>) {
        self.handlers.add_server_publication_handler(event, handler);
    }

    pub fn add_out_of_dialog_handler(&mut self, method: Method, handler: Arc<dyn OutOfDialogHandler>) {
        self.handlers.add_out_of_dialog_handler(method, handler);
    }

    /// Process one event and send everything it produced
    pub async fn handle_event(&mut self, event: DumEvent) -> DumResult<()> {
        let mut outbox = Outbox::new();
        self.dispatch(event, &mut outbox);
        self.flush(&mut outbox).await
    }

    /// Pump the stack once and handle every event it delivered
    ///
    /// Returns the number of events handled.
    pub async fn process(&mut self) -> DumResult<usize> {
        self.stack.process().await?;
        let mut handled = 0;
        while let Some(event) = self.stack.receive() {
            self.handle_event(event).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Process events until the stack fails or shuts down
    pub async fn run(&mut self) -> DumResult<()> {
        info!("DialogUsageManager running");
        loop {
            if let Err(e) = self.process().await {
                info!("DialogUsageManager stopped: {}", e);
                return Err(e);
            }
        }
    }

    pub(crate) async fn flush(&mut self, outbox: &mut Outbox) -> DumResult<()> {
        for message in outbox.drain() {
            debug!("Sending {}", message.brief());
            self.stack.send(message).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for DialogUsageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogUsageManager")
            .field("identity", &self.config.identity)
            .field("dialog_sets", &self.dialog_sets.len())
            .field("usages", &self.usages.len())
            .field("client_auth", &self.client_auth.is_some())
            .field("server_auth", &self.server_auth.is_some())
            .field("redirect", &self.redirect.is_some())
            .field("handlers", &self.handlers)
            .finish()
    }
}
