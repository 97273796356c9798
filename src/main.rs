//! Otakuverse - anime character chat CLI
//!
//! Main entry point: initializes tracing, loads configuration, opens the
//! state store, and dispatches to the command handlers.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use otakuverse::cli::{
    Cli, Commands, ModelCommand, PersonaCommand, SessionCommand, SettingsCommand,
};
use otakuverse::commands;
use otakuverse::config::Config;
use otakuverse::storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)?;
    config.validate()?;
    let storage = Storage::open_default()?;

    match cli.command {
        Commands::Chat { persona, provider } => {
            tracing::info!("Starting interactive chat");
            commands::chat::run_chat(config, storage, persona, provider).await
        }
        Commands::Personas { command } => match command {
            PersonaCommand::List { filter } => commands::personas::list(storage, filter),
            PersonaCommand::Search { query } => {
                commands::personas::search(config, storage, query).await
            }
        },
        Commands::Sessions { command } => match command {
            SessionCommand::List => commands::sessions::list(storage),
            SessionCommand::Delete { id } => commands::sessions::delete(storage, id),
        },
        Commands::Settings { command } => match command {
            SettingsCommand::Show => commands::settings::show(storage),
            SettingsCommand::SetProvider { provider } => {
                commands::settings::set_provider(storage, provider)
            }
            SettingsCommand::SetKey { provider, key } => {
                commands::settings::set_key(storage, provider, key)
            }
            SettingsCommand::SetModel { provider, model } => {
                commands::settings::set_model(storage, provider, model)
            }
            SettingsCommand::SetAvatar { url } => commands::settings::set_avatar(storage, url),
            SettingsCommand::SetTheme { theme } => commands::settings::set_theme(storage, theme),
        },
        Commands::Models { command } => match command {
            ModelCommand::List => commands::models::list(config, storage).await,
        },
        Commands::Quota => commands::quota::show(storage),
        Commands::Relay { listen } => {
            tracing::info!("Starting relay server");
            commands::relay::run(config, listen).await
        }
    }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug-level
/// output and the default stays quiet.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "otakuverse=debug"
    } else {
        "otakuverse=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
