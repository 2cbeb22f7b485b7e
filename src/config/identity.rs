//! Registered application identity (client id and secret).

use std::fmt;
use std::fs;
use std::path::Path;

use crate::auth::AuthError;

/// The registered application's id and secret, immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    client_id: String,
    client_secret: String,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Load from a `<client_id>,<client_secret>` file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::Configuration(format!(
                    "Client identity file {} not found; create it with one line `<client_id>,<client_secret>`",
                    path.display()
                )))
            }
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        Self::parse(&raw).map_err(|reason| {
            AuthError::Configuration(format!(
                "Client identity file {}: {reason}",
                path.display()
            ))
        })
    }

    /// Parse `<client_id>,<client_secret>`, splitting on the first comma.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (client_id, client_secret) = raw
            .trim()
            .split_once(',')
            .ok_or_else(|| "expected `<client_id>,<client_secret>`".to_string())?;
        let (client_id, client_secret) = (client_id.trim(), client_secret.trim());
        if client_id.is_empty() || client_secret.is_empty() {
            return Err("client id and secret must both be non-empty".to_string());
        }
        Ok(Self::new(client_id, client_secret))
    }
}
