//! strava-at-home: single-user Strava OAuth2 token management.
//!
//! Keeps a long-lived refresh token on disk, refreshes the access token
//! before it runs out, and falls back to a browser consent flow with a
//! localhost callback when nothing usable is stored.
//!
//! # Quick Start
//!
//! ```no_run
//! use strava_at_home::auth::{AuthState, TokenManager};
//! use strava_at_home::config::Settings;
//!
//! # async fn example() -> strava_at_home::error::Result<()> {
//! let settings = Settings::load(None)?;
//! let mut manager = TokenManager::from_settings(&settings)?;
//! if manager.authenticate().await? == AuthState::Ready {
//!     if let Some(client) = manager.authorized() {
//!         println!("{}", client.profile().await?.display_name());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod remote;

#[cfg(feature = "cli")]
pub mod cli;
