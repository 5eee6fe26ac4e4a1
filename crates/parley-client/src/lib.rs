//! # parley-client
//!
//! HTTP access to the Parley chat backend.
//!
//! - [`ApiClient`] implements both backend traits from `parley-core`
//! - [`contracts`] holds the wire bodies
//! - [`BrowserRedirector`] sends the user to hosted checkout
//! - [`session`] restores the persisted credential at startup

pub mod api;
pub mod checkout;
pub mod contracts;
pub mod session;

pub use api::ApiClient;
pub use checkout::{BrowserRedirector, Redirect, RedirectError, Redirector};
pub use session::{credential_store, restore_session, session_client};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
