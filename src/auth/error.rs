use thiserror::Error;

use crate::error::StravaError;

/// Authentication errors raised while managing the OAuth2 token lifecycle.
///
/// [`AuthError::AuthorizationDenied`] and [`AuthError::ConsentDenied`] are the
/// expected, recoverable failures; everything else is unexpected and should
/// reach the operator unchanged.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token store: {0}")]
    MalformedStore(String),
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),
    #[error("Consent denied by user")]
    ConsentDenied,
    #[error("Timed out after {secs}s waiting for the consent callback")]
    ConsentTimeout { secs: u64 },
    #[error("Consent callback error: {0}")]
    Callback(String),
    #[error("Unexpected remote failure: {0}")]
    UnexpectedRemoteFailure(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// True for the remote rejecting a refresh token, authorization code or
    /// access token.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::AuthorizationDenied(_))
    }

    /// True when the user did not complete consent (declined or walked away).
    pub fn is_consent_failure(&self) -> bool {
        matches!(self, Self::ConsentDenied | Self::ConsentTimeout { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::UnexpectedRemoteFailure(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::UnexpectedRemoteFailure(format!("undecodable response: {error}"))
    }
}

impl From<AuthError> for StravaError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Configuration(message) => StravaError::Configuration(message),
            other => StravaError::Auth(other),
        }
    }
}
