//! CLI auth command handlers.
//!
//! Each handler returns `Ok(true)` on success and `Ok(false)` for an expected
//! authentication failure, which the binary turns into exit status 1.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::auth::{AuthState, NoBrowser, TokenManager};
use crate::config::Settings;
use crate::error::Result;

/// Handle `strava-at-home auth login`.
pub async fn handle_login(settings: &Settings, no_browser: bool) -> Result<bool> {
    let mut manager = TokenManager::from_settings(settings)?;
    if no_browser {
        manager = manager.with_browser(Arc::new(NoBrowser));
    }

    let state = manager.authenticate().await?;
    tracing::info!(%state, "authentication finished");
    match state {
        AuthState::Ready => {
            let expiry = format_expiry(manager.credential().expires_at);
            match manager.authorized() {
                Some(client) => match client.profile().await {
                    Ok(profile) => {
                        println!("Logged in as {} (token expires {expiry})", profile.display_name())
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "profile lookup after login failed");
                        println!("Logged in (token expires {expiry})");
                    }
                },
                None => println!("Logged in (token expires {expiry})"),
            }
            if !manager.verify_needed_scopes() {
                eprintln!(
                    "Some permissions were not granted; delete {} and log in again to fix this",
                    settings.token_file.display()
                );
            }
            Ok(true)
        }
        AuthState::Failed => {
            eprintln!("Login failed");
            Ok(false)
        }
    }
}

/// Handle `strava-at-home auth status`. Never contacts Strava.
pub async fn handle_status(settings: &Settings) -> Result<bool> {
    let mut manager = TokenManager::from_settings(settings)?;
    println!("Token file: {}", settings.token_file.display());

    let Some(credential) = manager.load_persisted()? else {
        println!("Status: not logged in");
        return Ok(false);
    };
    let now = Utc::now().timestamp();
    let status = if credential.is_valid_at(now) {
        format!(
            "logged in (expires {}, {} min left)",
            format_expiry(credential.expires_at),
            credential.remaining_secs_at(now) / 60
        )
    } else {
        format!(
            "access token expired {} (refresh on next use)",
            format_expiry(credential.expires_at)
        )
    };
    println!("Status: {status}");
    println!("Scopes requested: {}", settings.scopes_needed.join(","));
    Ok(true)
}

/// Handle `strava-at-home auth check`.
pub async fn handle_check(settings: &Settings, thorough: bool) -> Result<bool> {
    let mut manager = TokenManager::from_settings(settings)?;
    if manager.load_persisted()?.is_none() {
        eprintln!("Not logged in. Run: strava-at-home auth login");
        return Ok(false);
    }
    if !manager.ensure_access(thorough).await? {
        eprintln!("Stored token no longer grants access. Run: strava-at-home auth login");
        return Ok(false);
    }
    println!(
        "Access OK (token expires {})",
        format_expiry(manager.credential().expires_at)
    );
    Ok(manager.verify_needed_scopes())
}

/// Handle `strava-at-home auth logout`.
pub async fn handle_logout(settings: &Settings) -> Result<bool> {
    let mut manager = TokenManager::from_settings(settings)?;
    manager.logout()?;
    println!("Removed {}", settings.token_file.display());
    Ok(true)
}

fn format_expiry(expires_at: i64) -> String {
    DateTime::<Utc>::from_timestamp(expires_at, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| expires_at.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_rendered_in_utc() {
        assert_eq!(format_expiry(1_700_000_000), "2023-11-14 22:13 UTC");
    }

    #[test]
    fn out_of_range_expiry_falls_back_to_epoch_seconds() {
        assert_eq!(format_expiry(i64::MAX), i64::MAX.to_string());
    }
}
