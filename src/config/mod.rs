//! Configuration system (layered: env > settings file > defaults).

pub mod identity;

pub use identity::ClientIdentity;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::auth::TokenManagerOptions;
use crate::error::{Result, StravaError};
use crate::remote::strava::{DEFAULT_API_BASE_URL, DEFAULT_OAUTH_BASE_URL};

pub const DEFAULT_MIN_TIME_LEFT_SECS: i64 = 3600;
pub const DEFAULT_CALLBACK_PORT: u16 = 5000;
pub const DEFAULT_CONSENT_TIMEOUT_SECS: u64 = 300;
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Settings for one user/service pair.
///
/// # Example
/// ```no_run
/// use strava_at_home::config::Settings;
///
/// let settings = Settings::load(None)?;
/// println!("tokens live in {}", settings.token_file.display());
/// # Ok::<(), strava_at_home::error::StravaError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Persisted `<access> <expires_at> <refresh>` record; written by this tool.
    pub token_file: PathBuf,
    /// `<client_id>,<client_secret>` of the registered application.
    pub client_id_file: PathBuf,
    /// Reading needs `activity:read_all`, uploading needs `activity:write`.
    pub scopes_needed: Vec<String>,
    /// Minimum remaining validity (s) of the access token after `ensure_access`.
    pub min_time_left: i64,
    pub redirect_host: String,
    pub port: u16,
    pub consent_timeout_secs: u64,
    /// Never open a browser; fail instead of asking for consent.
    pub batch_mode: bool,
    /// Whether the first access check contacts the remote service.
    pub thorough_check: bool,
    /// Force every access check to contact the remote service.
    pub check_access_always_thorough: bool,
    pub oauth_base_url: String,
    pub api_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("token"),
            client_id_file: PathBuf::from("client.secret"),
            scopes_needed: vec!["activity:read_all".to_string(), "activity:write".to_string()],
            min_time_left: DEFAULT_MIN_TIME_LEFT_SECS,
            redirect_host: "localhost".to_string(),
            port: DEFAULT_CALLBACK_PORT,
            consent_timeout_secs: DEFAULT_CONSENT_TIMEOUT_SECS,
            batch_mode: false,
            thorough_check: true,
            check_access_always_thorough: false,
            oauth_base_url: DEFAULT_OAUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Default settings directory (`~/.strava-at-home`).
    pub fn default_dir() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".strava-at-home"))
            .unwrap_or_else(|| PathBuf::from(".strava-at-home"))
    }

    /// Load settings from `path` (or the default location), then apply
    /// environment overrides, including any from a `.env` file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::default_dir().join(SETTINGS_FILE_NAME));
        let mut settings = Self::load_from_path(&path)?;
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Load a settings file; a missing file yields defaults.
    ///
    /// Relative token and client paths resolve against the file's directory.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut settings = match fs::read_to_string(path) {
            Ok(raw) => toml::from_str::<Self>(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Self::default()
            }
            Err(err) => return Err(StravaError::Io(err)),
        };
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        settings.token_file = resolve(&base, &settings.token_file);
        settings.client_id_file = resolve(&base, &settings.client_id_file);
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `STRAVA_*` overrides from `lookup`.
    ///
    /// Relative paths from the environment resolve against the current
    /// directory, the way a shell user expects, not against the settings file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let token_file = lookup("STRAVA_TOKEN_FILE");
        let client_id_file = lookup("STRAVA_CLIENT_ID_FILE");
        if token_file.is_some() || client_id_file.is_some() {
            let cwd = std::env::current_dir()?;
            if let Some(v) = token_file {
                self.token_file = resolve(&cwd, Path::new(&v));
            }
            if let Some(v) = client_id_file {
                self.client_id_file = resolve(&cwd, Path::new(&v));
            }
        }
        if let Some(v) = lookup("STRAVA_CALLBACK_PORT") {
            self.port = v.trim().parse().map_err(|_| {
                StravaError::Configuration(format!("STRAVA_CALLBACK_PORT={v} is not a port"))
            })?;
        }
        if let Some(v) = lookup("STRAVA_MIN_TIME_LEFT") {
            self.min_time_left = v.trim().parse().map_err(|_| {
                StravaError::Configuration(format!("STRAVA_MIN_TIME_LEFT={v} is not an integer"))
            })?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.scopes_needed.is_empty() {
            return Err(StravaError::Configuration(
                "scopes_needed must list at least one scope".to_string(),
            ));
        }
        if self.min_time_left < 0 {
            return Err(StravaError::Configuration(format!(
                "min_time_left must not be negative (got {})",
                self.min_time_left
            )));
        }
        Ok(())
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn token_manager_options(&self) -> TokenManagerOptions {
        TokenManagerOptions {
            min_time_left: self.min_time_left,
            scopes_needed: self.scopes_needed.clone(),
            redirect_host: self.redirect_host.clone(),
            port: self.port,
            consent_timeout: self.consent_timeout(),
            batch_mode: self.batch_mode,
            thorough_check: self.thorough_check,
            check_access_always_thorough: self.check_access_always_thorough,
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
