//! Remote fitness-API capabilities consumed by the token lifecycle.

pub mod strava;

pub use strava::StravaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, TokenTriple};
use crate::config::ClientIdentity;

/// Authenticated athlete profile, used as the thorough-check probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        match (&self.firstname, &self.lastname, &self.username) {
            (Some(first), Some(last), _) => format!("{first} {last}"),
            (Some(first), None, _) => first.clone(),
            (None, _, Some(username)) => username.clone(),
            _ => format!("athlete {}", self.id),
        }
    }
}

/// OAuth and account endpoints of the remote service.
///
/// Implementations map a rejected grant or token to
/// [`AuthError::AuthorizationDenied`] and every other failure to
/// [`AuthError::UnexpectedRemoteFailure`].
#[async_trait]
pub trait FitnessApi: Send + Sync {
    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String, AuthError>;

    async fn exchange_code_for_token(
        &self,
        identity: &ClientIdentity,
        code: &str,
    ) -> Result<TokenTriple, AuthError>;

    async fn refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<TokenTriple, AuthError>;

    async fn get_authenticated_profile(&self, access_token: &str) -> Result<Profile, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: 42,
            username: None,
            firstname: None,
            lastname: None,
            weight: None,
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        let p = Profile {
            firstname: Some("Migo".into()),
            lastname: Some("Mueller".into()),
            username: Some("mm".into()),
            ..profile()
        };
        assert_eq!(p.display_name(), "Migo Mueller");
    }

    #[test]
    fn display_name_falls_back_to_username_then_id() {
        let p = Profile {
            username: Some("mm".into()),
            ..profile()
        };
        assert_eq!(p.display_name(), "mm");
        assert_eq!(profile().display_name(), "athlete 42");
    }
}
