//! Authentication and redirection hooks
//!
//! All managers are optional. When none is installed every message is
//! admitted.

use crate::message::{Request, Response};

/// Inspects responses to our requests, e.g. to retry a 401/407 with credentials
pub trait ClientAuthManager: Send {
    /// True to continue processing `response`, false when the manager consumed it
    fn handle(&mut self, response: &Response) -> bool;
}

/// Admits or challenges inbound requests
pub trait ServerAuthManager: Send {
    /// True to admit `request`
    fn handle(&mut self, request: &Request) -> bool;

    /// Response to send for a request that was not admitted
    fn challenge(&mut self, _request: &Request) -> Option<Response> {
        None
    }
}

/// Sees 3xx responses to our requests before they are routed
///
/// A manager that retries the request towards a Contact of the redirect
/// consumes the 3xx; the dialog set then stays pending for the retry.
pub trait RedirectManager: Send {
    /// True to continue processing `response`, false when the manager consumed it
    fn handle(&mut self, response: &Response) -> bool;
}
