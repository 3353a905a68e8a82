//! Dialog sets, dialogs and their identifiers

pub mod dialog_id;
pub mod dialog_impl;
pub mod dialog_set;

pub use dialog_id::{derive_server_tag, DialogId, DialogSetId};
pub use dialog_impl::{Dialog, DialogState};
pub use dialog_set::DialogSet;
