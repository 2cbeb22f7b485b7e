use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{FitnessApi, Profile};
use crate::auth::{AuthError, TokenTriple};
use crate::config::ClientIdentity;

pub const DEFAULT_OAUTH_BASE_URL: &str = "https://www.strava.com";
pub const DEFAULT_API_BASE_URL: &str = "https://www.strava.com";

const ERROR_BODY_SNIPPET_CHARS: usize = 200;

/// Strava OAuth2 and athlete endpoints.
///
/// # Example
/// ```no_run
/// use strava_at_home::remote::{FitnessApi, StravaClient};
///
/// let client = StravaClient::new();
/// let url = client.authorization_url(
///     "12345",
///     "http://localhost:5000/authorized",
///     &["activity:read_all".to_string(), "activity:write".to_string()],
/// )?;
/// # Ok::<(), strava_at_home::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StravaClient {
    client: reqwest::Client,
    oauth_base_url: String,
    api_base_url: String,
}

impl StravaClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            oauth_base_url: DEFAULT_OAUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    pub fn with_oauth_base_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_base_url = url.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.oauth_base_url.trim_end_matches('/'))
    }

    async fn post_token_form(
        &self,
        form: &[(&str, &str)],
        what: &str,
    ) -> Result<TokenTriple, AuthError> {
        let resp = self
            .client
            .post(self.token_url())
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(classify_failure(resp, what).await);
        }
        let payload: TokenResponse = resp.json().await?;
        payload.into_triple(what)
    }
}

impl Default for StravaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FitnessApi for StravaClient {
    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String, AuthError> {
        let base = format!("{}/oauth/authorize", self.oauth_base_url.trim_end_matches('/'));
        let scope = scopes.join(",");
        let url = Url::parse_with_params(
            &base,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("approval_prompt", "auto"),
                ("scope", scope.as_str()),
            ],
        )
        .map_err(|e| AuthError::Configuration(format!("invalid OAuth base URL {base}: {e}")))?;
        Ok(url.to_string())
    }

    async fn exchange_code_for_token(
        &self,
        identity: &ClientIdentity,
        code: &str,
    ) -> Result<TokenTriple, AuthError> {
        self.post_token_form(
            &[
                ("client_id", identity.client_id()),
                ("client_secret", identity.client_secret()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ],
            "Authorization code exchange",
        )
        .await
    }

    async fn refresh_token(
        &self,
        identity: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<TokenTriple, AuthError> {
        self.post_token_form(
            &[
                ("client_id", identity.client_id()),
                ("client_secret", identity.client_secret()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
            "Token refresh",
        )
        .await
    }

    async fn get_authenticated_profile(&self, access_token: &str) -> Result<Profile, AuthError> {
        let url = format!("{}/api/v3/athlete", self.api_base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(classify_failure(resp, "Athlete lookup").await);
        }
        Ok(resp.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

impl TokenResponse {
    fn into_triple(self, what: &str) -> Result<TokenTriple, AuthError> {
        // The store format is whitespace separated.
        let well_formed = |token: &str| !token.is_empty() && !token.contains(char::is_whitespace);
        if !well_formed(self.access_token.as_str()) || !well_formed(self.refresh_token.as_str()) {
            return Err(AuthError::UnexpectedRemoteFailure(format!(
                "{what} returned an unusable token"
            )));
        }
        Ok(TokenTriple {
            access_token: self.access_token,
            expires_at: self.expires_at,
            refresh_token: self.refresh_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StravaFault {
    #[serde(default)]
    errors: Vec<StravaFaultError>,
}

#[derive(Debug, Deserialize)]
struct StravaFaultError {
    #[serde(default)]
    resource: String,
    #[serde(default)]
    code: String,
}

/// 400 responses naming an invalid refresh token or authorization code mean
/// the grant was rejected.
fn reports_invalid_grant(body: &str) -> bool {
    serde_json::from_str::<StravaFault>(body)
        .map(|fault| {
            fault.errors.iter().any(|e| {
                e.code == "invalid"
                    && matches!(e.resource.as_str(), "RefreshToken" | "AuthorizationCode")
            })
        })
        .unwrap_or(false)
}

async fn classify_failure(resp: reqwest::Response, what: &str) -> AuthError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AuthError::AuthorizationDenied(format!("{what} rejected with status {status}"));
    }
    if status == StatusCode::BAD_REQUEST && reports_invalid_grant(&body) {
        return AuthError::AuthorizationDenied(format!("{what} rejected: invalid grant"));
    }
    let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect();
    AuthError::UnexpectedRemoteFailure(format!("{what} failed with status {status}: {snippet}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_embeds_client_redirect_and_scopes() {
        let client = StravaClient::new().with_oauth_base_url("https://auth.example/");
        let url = client
            .authorization_url(
                "12345",
                "http://localhost:5000/authorized",
                &["activity:read_all".to_string(), "activity:write".to_string()],
            )
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/oauth/authorize");
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "12345");
        assert_eq!(pairs["redirect_uri"], "http://localhost:5000/authorized");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "activity:read_all,activity:write");
    }

    #[test]
    fn authorization_url_rejects_invalid_base() {
        let client = StravaClient::new().with_oauth_base_url("not a url");
        let err = client.authorization_url("1", "http://localhost/", &[]).unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn invalid_refresh_token_fault_is_recognised() {
        let body = r#"{"message":"Bad Request","errors":[{"resource":"RefreshToken","field":"refresh_token","code":"invalid"}]}"#;
        assert!(reports_invalid_grant(body));
        let body = r#"{"message":"Bad Request","errors":[{"resource":"AuthorizationCode","field":"code","code":"invalid"}]}"#;
        assert!(reports_invalid_grant(body));
    }

    #[test]
    fn other_faults_are_not_invalid_grants() {
        assert!(!reports_invalid_grant(
            r#"{"message":"Bad Request","errors":[{"resource":"Application","field":"client_id","code":"invalid"}]}"#
        ));
        assert!(!reports_invalid_grant("<html>oops</html>"));
        assert!(!reports_invalid_grant(""));
    }

    #[test]
    fn token_response_with_whitespace_is_rejected() {
        let response = TokenResponse {
            access_token: "a b".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 1,
        };
        assert!(matches!(
            response.into_triple("Token refresh"),
            Err(AuthError::UnexpectedRemoteFailure(_))
        ));
    }
}
