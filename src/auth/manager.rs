use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::browser::{BrowserOpener, NoBrowser, SystemBrowser};
use super::callback::{CallbackRequest, ConsentSession};
use super::error::AuthError;
use super::store::{FileTokenStore, TokenStore};
use super::token::{parse_scopes, Credential, TokenTriple};
use crate::config::{
    ClientIdentity, Settings, DEFAULT_CALLBACK_PORT, DEFAULT_CONSENT_TIMEOUT_SECS,
    DEFAULT_MIN_TIME_LEFT_SECS,
};
use crate::remote::{FitnessApi, Profile, StravaClient};

/// Tunables of the token lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenManagerOptions {
    /// Minimum remaining validity (s) guaranteed by a successful `ensure_access`.
    pub min_time_left: i64,
    /// Scopes requested during consent and checked by `verify_needed_scopes`.
    pub scopes_needed: Vec<String>,
    pub redirect_host: String,
    /// Callback port; `0` binds an ephemeral port.
    pub port: u16,
    pub consent_timeout: Duration,
    /// Never fall back to the interactive consent flow.
    pub batch_mode: bool,
    /// Thoroughness of the access check made by `authenticate`.
    pub thorough_check: bool,
    /// Make every access check thorough, whatever the caller asks for.
    pub check_access_always_thorough: bool,
}

impl Default for TokenManagerOptions {
    fn default() -> Self {
        Self {
            min_time_left: DEFAULT_MIN_TIME_LEFT_SECS,
            scopes_needed: vec!["activity:read_all".to_string(), "activity:write".to_string()],
            redirect_host: "localhost".to_string(),
            port: DEFAULT_CALLBACK_PORT,
            consent_timeout: Duration::from_secs(DEFAULT_CONSENT_TIMEOUT_SECS),
            batch_mode: false,
            thorough_check: true,
            check_access_always_thorough: false,
        }
    }
}

/// Outcome of [`TokenManager::authenticate`], the only states callers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AuthState {
    Ready,
    Failed,
}

/// Keeps one user's access token usable against one remote service.
///
/// Holds the remote API as a capability rather than extending it, persists
/// every new token triple before adopting it in memory, and drives the
/// browser consent flow when no usable token exists.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use strava_at_home::auth::{AuthState, FileTokenStore, TokenManager};
/// use strava_at_home::config::ClientIdentity;
/// use strava_at_home::remote::StravaClient;
///
/// # async fn example() -> Result<(), strava_at_home::auth::AuthError> {
/// let mut manager = TokenManager::new(
///     ClientIdentity::load_from_path("client.secret")?,
///     Arc::new(StravaClient::new()),
///     Arc::new(FileTokenStore::new("token")),
/// );
/// if manager.authenticate().await? == AuthState::Ready && manager.ensure_access(false).await? {
///     let client = manager.authorized().expect("token present");
///     println!("hello {}", client.profile().await?.display_name());
/// }
/// # Ok(())
/// # }
/// ```
pub struct TokenManager {
    identity: ClientIdentity,
    api: Arc<dyn FitnessApi>,
    store: Arc<dyn TokenStore>,
    browser: Arc<dyn BrowserOpener>,
    options: TokenManagerOptions,
    credential: Credential,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("identity", &self.identity)
            .field("options", &self.options)
            .field("expires_at", &self.credential.expires_at)
            .field("has_access_token", &self.credential.access_token.is_some())
            .finish()
    }
}

impl TokenManager {
    pub fn new(
        identity: ClientIdentity,
        api: Arc<dyn FitnessApi>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            identity,
            api,
            store,
            browser: Arc::new(SystemBrowser),
            options: TokenManagerOptions::default(),
            credential: Credential::default(),
        }
    }

    /// Wire up the Strava client, file store and browser described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, AuthError> {
        let identity = ClientIdentity::load_from_path(&settings.client_id_file)?;
        let api = StravaClient::new()
            .with_oauth_base_url(&settings.oauth_base_url)
            .with_api_base_url(&settings.api_base_url);
        let browser: Arc<dyn BrowserOpener> = if settings.batch_mode {
            Arc::new(NoBrowser)
        } else {
            Arc::new(SystemBrowser)
        };
        Ok(Self::new(
            identity,
            Arc::new(api),
            Arc::new(FileTokenStore::new(&settings.token_file)),
        )
        .with_options(settings.token_manager_options())
        .with_browser(browser))
    }

    pub fn with_options(mut self, options: TokenManagerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserOpener>) -> Self {
        self.browser = browser;
        self
    }

    pub fn options(&self) -> &TokenManagerOptions {
        &self.options
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Read the persisted triple and adopt it as the in-memory credential.
    ///
    /// The store keeps no scope list, so the granted scopes are assumed to be
    /// the requested ones.
    pub fn load_persisted(&mut self) -> Result<Option<Credential>, AuthError> {
        let Some(triple) = self.store.load()? else {
            debug!("no persisted token");
            return Ok(None);
        };
        let mut credential = Credential::from_triple(triple);
        credential.scopes_granted = self.options.scopes_needed.iter().cloned().collect();
        credential.scopes_confirmed = false;
        self.credential = credential.clone();
        debug!(expires_at = credential.expires_at, "loaded persisted token");
        Ok(Some(credential))
    }

    /// Make sure the access token stays valid for at least `min_time_left`.
    ///
    /// Returns `Ok(false)` when the remote rejects the refresh token (or, for
    /// a thorough check, the access token). Every other failure propagates.
    pub async fn ensure_access(&mut self, thorough_check: bool) -> Result<bool, AuthError> {
        let now = Utc::now().timestamp();
        if self
            .credential
            .needs_refresh_at(now, self.options.min_time_left)
        {
            debug!(
                remaining_secs = self.credential.remaining_secs_at(now),
                "access token expires soon, refreshing"
            );
            match self.refresh().await {
                Ok(()) => {}
                Err(err) if err.is_authorization_failure() => {
                    warn!(error = %err, "could not authenticate using refresh token");
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }

        let Some(access_token) = self
            .credential
            .access_token
            .clone()
            .filter(|_| self.credential.is_valid())
        else {
            debug!("no usable access token");
            return Ok(false);
        };
        if !(thorough_check || self.options.check_access_always_thorough) {
            return Ok(true);
        }

        match self.api.get_authenticated_profile(&access_token).await {
            Ok(profile) => {
                debug!(athlete_id = profile.id, "remote accepted access token");
                Ok(true)
            }
            Err(err) if err.is_authorization_failure() => {
                warn!(error = %err, "remote rejected access token");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Exchange the refresh token for a new triple, persist it, then adopt it.
    ///
    /// Without a refresh token (consent never completed) this is a no-op.
    pub async fn refresh(&mut self) -> Result<(), AuthError> {
        let Some(refresh_token) = self.credential.refresh_token.clone() else {
            debug!("no refresh token available, skipping refresh");
            return Ok(());
        };
        let triple = self
            .api
            .refresh_token(&self.identity, &refresh_token)
            .await?;
        self.persist(triple)
    }

    /// Run one browser consent round trip and store the resulting tokens.
    ///
    /// Fails with [`AuthError::ConsentDenied`] (clearing the in-memory access
    /// token) when the redirect carries no code, and with
    /// [`AuthError::ConsentTimeout`] when no redirect arrives in time. The
    /// callback listener is released on every path.
    pub async fn acquire_via_consent_flow(&mut self) -> Result<(), AuthError> {
        let session = ConsentSession::bind(&self.options.redirect_host, self.options.port).await?;
        let authorize_url = self.api.authorization_url(
            self.identity.client_id(),
            &session.redirect_uri(),
            &self.options.scopes_needed,
        )?;

        info!(url = %authorize_url, "requesting authorization in the browser");
        if let Err(err) = self.browser.open(&authorize_url) {
            warn!(error = %err, url = %authorize_url, "could not open a browser; visit the URL to continue");
        }

        let request = session
            .wait_for_callback(self.options.consent_timeout)
            .await?;
        self.complete_consent(request).await
    }

    async fn complete_consent(&mut self, request: CallbackRequest) -> Result<(), AuthError> {
        let payload = request.payload.clone();
        let Some(code) = payload.code else {
            warn!(error = ?payload.error, "access was denied by user");
            self.credential.access_token = None;
            request.respond("Access was denied by user.\n").await;
            return Err(AuthError::ConsentDenied);
        };

        self.credential.scopes_granted = payload
            .scope
            .as_deref()
            .map(parse_scopes)
            .unwrap_or_default();
        self.credential.scopes_confirmed = true;

        let outcome = match self.api.exchange_code_for_token(&self.identity, &code).await {
            Ok(triple) => self.persist(triple),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => {
                request
                    .respond("Strava authentication successful. You may close this window.\n")
                    .await;
                Ok(())
            }
            Err(err) => {
                request
                    .respond(&format!("Strava authentication failed: {err}\n"))
                    .await;
                Err(err)
            }
        }
    }

    /// True iff an access token is held and every `required` scope was granted.
    ///
    /// After [`Self::load_persisted`] the answer is optimistic: the granted
    /// scopes are assumed, not known.
    pub fn verify_scopes<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.credential.access_token.is_none() {
            return false;
        }
        let missing: Vec<String> = required
            .into_iter()
            .filter(|scope| !self.credential.scopes_granted.contains(scope.as_ref()))
            .map(|scope| scope.as_ref().to_string())
            .collect();
        if !missing.is_empty() {
            warn!(
                granted = ?self.credential.scopes_granted,
                ?missing,
                "insufficient permissions granted; delete the token file to ask again"
            );
            return false;
        }
        if !self.credential.scopes_confirmed {
            debug!("granted scopes assumed from the request, not confirmed by the provider");
        }
        true
    }

    /// [`Self::verify_scopes`] against the configured `scopes_needed`.
    pub fn verify_needed_scopes(&self) -> bool {
        self.verify_scopes(&self.options.scopes_needed)
    }

    /// Bring the manager to [`AuthState::Ready`] or report [`AuthState::Failed`].
    ///
    /// Tries the persisted token first (refreshing it when stale), then, unless
    /// in batch mode, the consent flow. Unexpected errors propagate.
    pub async fn authenticate(&mut self) -> Result<AuthState, AuthError> {
        if self.load_persisted()?.is_some() {
            if self.ensure_access(self.options.thorough_check).await? {
                info!("authenticated with persisted token");
                return Ok(AuthState::Ready);
            }
            warn!("persisted token no longer grants access");
        }

        if self.options.batch_mode {
            warn!("no usable token in batch mode, not asking for consent");
            return Ok(AuthState::Failed);
        }

        match self.acquire_via_consent_flow().await {
            Ok(()) => {}
            Err(err) if err.is_consent_failure() || err.is_authorization_failure() => {
                warn!(error = %err, "authorization not granted");
                return Ok(AuthState::Failed);
            }
            Err(err) => return Err(err),
        }
        self.verify_needed_scopes();
        info!("authenticated through consent flow");
        Ok(AuthState::Ready)
    }

    /// Handle for making calls with the current access token.
    pub fn authorized(&self) -> Option<AuthorizedClient> {
        self.credential
            .access_token
            .clone()
            .map(|access_token| AuthorizedClient {
                api: self.api.clone(),
                access_token,
            })
    }

    /// Forget the persisted and in-memory tokens.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.store.clear()?;
        self.credential = Credential::default();
        Ok(())
    }

    fn persist(&mut self, triple: TokenTriple) -> Result<(), AuthError> {
        self.store.save(&triple)?;
        debug!(expires_at = triple.expires_at, "stored new token triple");
        self.credential.apply(triple);
        Ok(())
    }
}

/// API handle paired with an access token.
#[derive(Clone)]
pub struct AuthorizedClient {
    api: Arc<dyn FitnessApi>,
    access_token: String,
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl AuthorizedClient {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub async fn profile(&self) -> Result<Profile, AuthError> {
        self.api.get_authenticated_profile(&self.access_token).await
    }
}
