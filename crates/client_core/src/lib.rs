//! Client-side phonebook core: the in-memory directory, the gateway to the
//! remote collection, and the controller that reconciles the two.

pub mod confirm;
pub mod controller;
pub mod error;
pub mod notification;
pub mod remote;
pub mod store;

pub use confirm::{Confirm, ConfirmPrompt, FixedAnswer};
pub use controller::{
    ControllerConfig, DeleteOutcome, DirectoryEvent, DirectoryView, ReconciliationController,
    SubmitOutcome, DEFAULT_NOTIFICATION_TTL,
};
pub use error::DirectoryError;
pub use notification::{Notification, Polarity};
pub use remote::{DirectoryClient, HttpDirectoryClient, DEFAULT_REQUEST_TIMEOUT};
pub use store::DirectoryStore;
