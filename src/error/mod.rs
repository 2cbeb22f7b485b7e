//! Error types for strava-at-home.

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for crate-level operations (settings, CLI plumbing).
#[derive(Error, Debug)]
pub enum StravaError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Settings parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Auth(AuthError),
}

impl StravaError {
    /// Whether the failure is an expected authentication outcome rather than
    /// a fault in the environment.
    pub fn is_auth_state(&self) -> bool {
        match self {
            Self::Auth(err) => err.is_authorization_failure() || err.is_consent_failure(),
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StravaError>;
