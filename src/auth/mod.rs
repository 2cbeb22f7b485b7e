//! Token lifecycle: persistence, refresh, browser consent and scope checks.

pub mod browser;
pub mod callback;
pub mod error;
pub mod manager;
pub mod store;
pub mod token;

pub use browser::{BrowserOpener, NoBrowser, SystemBrowser};
pub use callback::{CallbackPayload, CallbackRequest, ConsentSession, REDIRECT_PATH};
pub use error::AuthError;
pub use manager::{AuthState, AuthorizedClient, TokenManager, TokenManagerOptions};
pub use store::{FileTokenStore, TokenStore};
pub use token::{parse_scopes, Credential, TokenTriple};
