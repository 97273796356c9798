//! Relay server handler

use crate::config::Config;
use crate::error::Result;
use crate::relay::{serve, RelayState, SERVER_KEY_ENV};
use colored::Colorize;

/// Run the relay server
///
/// The shared credential is read from `GROQ_API_KEY`; without it the
/// relay starts but answers every request with the not-configured error.
pub async fn run(config: Config, listen: Option<String>) -> Result<()> {
    let listen = listen.unwrap_or_else(|| config.relay.listen.clone());
    let state = RelayState::from_env(config.relay.upstream.clone())?;

    if std::env::var(SERVER_KEY_ENV).is_err() {
        println!(
            "{}",
            format!("Warning: {} is not set", SERVER_KEY_ENV).yellow()
        );
    }
    println!("Relay serving on {}", listen.cyan());
    serve(&listen, state).await
}
