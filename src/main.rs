//! strava-at-home binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use strava_at_home::cli::{auth, errors, AuthCommands, Cli, Commands};
use strava_at_home::config::Settings;
use strava_at_home::error::Result;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", errors::format_error_help(&e));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.batch_mode |= cli.batch;

    match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login(args) => auth::handle_login(&settings, args.no_browser).await,
            AuthCommands::Status => auth::handle_status(&settings).await,
            AuthCommands::Check(args) => auth::handle_check(&settings, args.thorough).await,
            AuthCommands::Logout => auth::handle_logout(&settings).await,
        },
    }
}
