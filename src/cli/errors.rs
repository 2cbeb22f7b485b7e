//! User-facing help for CLI failures.

use crate::auth::AuthError;
use crate::error::StravaError;

/// Map a [`StravaError`] to a message with actionable guidance.
pub fn format_error_help(err: &StravaError) -> String {
    match err {
        StravaError::Auth(AuthError::AuthorizationDenied(msg)) => {
            format!("Strava rejected the stored grant ({msg}). Run: strava-at-home auth login")
        }
        StravaError::Auth(AuthError::MalformedStore(msg)) => {
            format!("Token file is corrupt: {msg}. Run: strava-at-home auth logout, then auth login")
        }
        StravaError::Auth(AuthError::Configuration(msg)) | StravaError::Configuration(msg) => {
            format!("Configuration error: {msg}. Check settings.toml or the STRAVA_* variables")
        }
        other if other.is_auth_state() => {
            format!("{other}. Run: strava-at-home auth login to try again")
        }
        other => other.to_string(),
    }
}
