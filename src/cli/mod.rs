//! CLI argument definitions for strava-at-home.

pub mod auth;
pub mod errors;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Strava token management CLI
#[derive(Parser, Debug)]
#[command(
    name = "strava-at-home",
    version,
    about = "Keep a Strava access token usable for local tools"
)]
pub struct Cli {
    /// Settings file (default: ~/.strava-at-home/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Never ask for consent in a browser; fail instead
    #[arg(long, global = true)]
    pub batch: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Authenticate, refreshing or asking for consent as needed
    Login(LoginArgs),
    /// Show the stored token without contacting Strava
    Status,
    /// Ensure the stored token grants access
    Check(CheckArgs),
    /// Delete the stored token
    Logout,
}

/// Arguments for `strava-at-home auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Print the consent URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// Arguments for `strava-at-home auth check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Also ask Strava whether the access token is accepted
    #[arg(long)]
    pub thorough: bool,
}
