use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Token triple minted by the token endpoint and persisted by a token store.
///
/// Each triple fully supersedes the previous one; fields are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTriple {
    pub access_token: String,
    /// Epoch seconds after which `access_token` is invalid.
    pub expires_at: i64,
    pub refresh_token: String,
}

/// In-memory OAuth2 state for one user/service pair.
///
/// # Example
/// ```no_run
/// use strava_at_home::auth::{Credential, TokenTriple};
///
/// let credential = Credential::from_triple(TokenTriple {
///     access_token: "access".to_string(),
///     expires_at: 1_700_000_000,
///     refresh_token: "refresh".to_string(),
/// });
/// assert!(!credential.is_valid_at(1_700_000_000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: i64,
    pub scopes_granted: BTreeSet<String>,
    /// `true` when `scopes_granted` came from a consent callback, `false` when
    /// it was assumed after loading a persisted token (the store keeps no
    /// scope list).
    pub scopes_confirmed: bool,
}

impl Credential {
    pub fn from_triple(triple: TokenTriple) -> Self {
        let mut credential = Self::default();
        credential.apply(triple);
        credential
    }

    /// Replace all three token fields with a freshly minted triple.
    pub fn apply(&mut self, triple: TokenTriple) {
        self.access_token = Some(triple.access_token);
        self.refresh_token = Some(triple.refresh_token);
        self.expires_at = triple.expires_at;
    }

    /// The access token is only valid while present and `now < expires_at`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.access_token.is_some() && now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp())
    }

    /// Whether fewer than `min_time_left` seconds remain at `now`.
    pub fn needs_refresh_at(&self, now: i64, min_time_left: i64) -> bool {
        now >= self.expires_at.saturating_sub(min_time_left)
    }

    /// Seconds of validity left at `now`; negative once expired.
    pub fn remaining_secs_at(&self, now: i64) -> i64 {
        self.expires_at - now
    }
}

/// Split a provider scope string (`"read,activity:write"`) into a set.
pub fn parse_scopes(raw: &str) -> BTreeSet<String> {
    raw.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(access: &str, expires_at: i64, refresh: &str) -> TokenTriple {
        TokenTriple {
            access_token: access.to_string(),
            expires_at,
            refresh_token: refresh.to_string(),
        }
    }

    #[test]
    fn apply_supersedes_every_token_field() {
        let mut credential = Credential::from_triple(triple("AT0", 100, "RT0"));
        credential.scopes_granted = parse_scopes("read");

        credential.apply(triple("AT1", 200, "RT1"));

        assert_eq!(credential.access_token.as_deref(), Some("AT1"));
        assert_eq!(credential.refresh_token.as_deref(), Some("RT1"));
        assert_eq!(credential.expires_at, 200);
        assert_eq!(credential.scopes_granted, parse_scopes("read"));
    }

    #[test]
    fn validity_requires_token_and_future_expiry() {
        let credential = Credential::from_triple(triple("AT", 1_000, "RT"));
        assert!(credential.is_valid_at(999));
        assert!(!credential.is_valid_at(1_000));

        let cleared = Credential {
            access_token: None,
            ..credential
        };
        assert!(!cleared.is_valid_at(0));
    }

    #[test]
    fn needs_refresh_inside_min_time_left_window() {
        let credential = Credential::from_triple(triple("AT", 10_000, "RT"));
        assert!(!credential.needs_refresh_at(6_399, 3_600));
        assert!(credential.needs_refresh_at(6_400, 3_600));
        assert!(credential.needs_refresh_at(20_000, 3_600));
        assert_eq!(credential.remaining_secs_at(9_000), 1_000);
    }

    #[test]
    fn default_credential_always_needs_refresh() {
        let credential = Credential::default();
        assert!(credential.needs_refresh_at(0, 3_600));
        assert!(!credential.is_valid_at(0));
    }

    #[test]
    fn parse_scopes_accepts_commas_and_spaces() {
        let scopes = parse_scopes("read, activity:write activity:read_all,,");
        let expected: Vec<&str> = vec!["activity:read_all", "activity:write", "read"];
        assert_eq!(scopes.iter().map(String::as_str).collect::<Vec<_>>(), expected);
        assert!(parse_scopes("").is_empty());
    }
}
