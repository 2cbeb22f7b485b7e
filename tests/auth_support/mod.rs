#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use strava_at_home::auth::{
    AuthError, BrowserOpener, NoBrowser, TokenManager, TokenManagerOptions, TokenStore,
    TokenTriple, REDIRECT_PATH,
};
use strava_at_home::config::ClientIdentity;
use strava_at_home::remote::StravaClient;
use tokio::task::JoinHandle;
use wiremock::MockServer;

#[derive(Default)]
pub struct InMemoryTokenStore {
    triple: Mutex<Option<TokenTriple>>,
    saves: AtomicUsize,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(triple: TokenTriple) -> Self {
        let store = Self::default();
        *store.triple.lock().expect("store lock poisoned") = Some(triple);
        store
    }

    pub fn get(&self) -> Option<TokenTriple> {
        self.triple.lock().expect("store lock poisoned").clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> Result<Option<TokenTriple>, AuthError> {
        Ok(self.get())
    }

    fn save(&self, triple: &TokenTriple) -> Result<(), AuthError> {
        *self.triple.lock().expect("store lock poisoned") = Some(triple.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.triple.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Triple whose access token expires `expires_in` seconds from now.
pub fn triple(access_token: &str, expires_in: i64, refresh_token: &str) -> TokenTriple {
    TokenTriple {
        access_token: access_token.to_string(),
        expires_at: now() + expires_in,
        refresh_token: refresh_token.to_string(),
    }
}

pub fn identity() -> ClientIdentity {
    ClientIdentity::new("12345", "client-secret")
}

pub fn strava_client(server: &MockServer) -> StravaClient {
    StravaClient::new()
        .with_oauth_base_url(server.uri())
        .with_api_base_url(server.uri())
}

/// Loopback callback on an ephemeral port, no browser, short consent window.
pub fn test_options() -> TokenManagerOptions {
    TokenManagerOptions {
        redirect_host: "127.0.0.1".to_string(),
        port: 0,
        consent_timeout: Duration::from_secs(5),
        thorough_check: false,
        ..TokenManagerOptions::default()
    }
}

pub fn manager(store: Arc<dyn TokenStore>, server: &MockServer) -> TokenManager {
    TokenManager::new(identity(), Arc::new(strava_client(server)), store)
        .with_options(test_options())
        .with_browser(Arc::new(NoBrowser))
}

/// Plays the user's browser: follows the consent URL straight to its
/// `redirect_uri`, appending `query` as the provider would.
pub struct CallbackBrowser {
    query: String,
    stray_request_first: bool,
    opened: Mutex<Vec<String>>,
    reply: Mutex<Option<JoinHandle<String>>>,
}

impl CallbackBrowser {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            stray_request_first: false,
            opened: Mutex::new(Vec::new()),
            reply: Mutex::new(None),
        }
    }

    /// Request `/favicon.ico` on the callback listener before the redirect.
    pub fn with_stray_request(mut self) -> Self {
        self.stray_request_first = true;
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("browser lock poisoned").clone()
    }

    /// Body the callback listener answered the redirect with.
    pub async fn reply(&self) -> String {
        let handle = self
            .reply
            .lock()
            .expect("browser lock poisoned")
            .take()
            .expect("browser was never opened");
        handle.await.expect("callback task panicked")
    }
}

impl BrowserOpener for CallbackBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let redirect_uri = parsed
            .query_pairs()
            .find(|(key, _)| key == "redirect_uri")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no redirect_uri")
            })?;

        let query = self.query.clone();
        let stray_request_first = self.stray_request_first;
        let handle = tokio::spawn(async move {
            let client = reqwest::Client::new();
            if stray_request_first {
                let origin = redirect_uri.trim_end_matches(REDIRECT_PATH);
                let resp = client
                    .get(format!("{origin}/favicon.ico"))
                    .send()
                    .await
                    .expect("stray request");
                assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
            }
            client
                .get(format!("{redirect_uri}?{query}"))
                .send()
                .await
                .expect("callback request")
                .text()
                .await
                .expect("callback body")
        });

        *self.reply.lock().expect("browser lock poisoned") = Some(handle);
        self.opened
            .lock()
            .expect("browser lock poisoned")
            .push(url.to_string());
        Ok(())
    }
}
