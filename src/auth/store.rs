use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::error::AuthError;
use super::token::TokenTriple;

/// Storage abstraction for the persisted token triple.
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<TokenTriple>, AuthError>;
    /// Overwrite the persisted triple wholesale.
    fn save(&self, triple: &TokenTriple) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// File-backed token store using a single plain-text line:
/// `<access_token> <expires_at> <refresh_token>`.
///
/// # Example
/// ```no_run
/// use strava_at_home::auth::{FileTokenStore, TokenStore, TokenTriple};
///
/// let store = FileTokenStore::new("token");
/// store.save(&TokenTriple {
///     access_token: "access".to_string(),
///     expires_at: 1_700_000_000,
///     refresh_token: "refresh".to_string(),
/// })?;
/// # Ok::<(), strava_at_home::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenTriple>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        parse_record(&raw).map(Some)
    }

    fn save(&self, triple: &TokenTriple) -> Result<(), AuthError> {
        atomic_write(&self.path, format_record(triple).as_bytes())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

/// Parse a persisted record into a triple.
pub fn parse_record(raw: &str) -> Result<TokenTriple, AuthError> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    let [access_token, expires_at, refresh_token] = fields.as_slice() else {
        return Err(AuthError::MalformedStore(format!(
            "expected 3 fields, found {}",
            fields.len()
        )));
    };
    let expires_at = expires_at.parse::<i64>().map_err(|_| {
        AuthError::MalformedStore(format!("expiry {expires_at:?} is not an integer"))
    })?;
    Ok(TokenTriple {
        access_token: access_token.to_string(),
        expires_at,
        refresh_token: refresh_token.to_string(),
    })
}

/// Render a triple as the newline-terminated persisted record.
pub fn format_record(triple: &TokenTriple) -> String {
    format!(
        "{} {} {}\n",
        triple.access_token, triple.expires_at, triple.refresh_token
    )
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Configuration(format!("Token path {} has no file name", path.display()))
    })?;
    let nonce = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
