//! Signon CLI
//!
//! Command-line front end for signon.
//!
//! # Usage
//!
//! ```bash
//! # Sign in with Google through the browser
//! signon sign-in google
//!
//! # Show which providers are configured
//! signon providers
//!
//! # Show the last stored Apple user identifier
//! signon apple-user
//! ```

mod presenter;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

use signon_core::config::default_config_path;
use signon_core::oauth::registry_from_config;
use signon_core::{
    APPLE_USER_IDENTIFIER_KEY, AuthError, AuthOrchestrator, AuthResult, MainQueue,
    PresentationResolver, ProviderKind, SignonConfig, SignonError, create_store, load_from_path,
};

use presenter::{TerminalPresenter, terminal_windows};

#[derive(Parser)]
#[command(name = "signon")]
#[command(about = "Sign in with Apple, Google or Microsoft")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a provider
    SignIn {
        /// Provider name (apple, google, outlook, email)
        provider: ProviderKind,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List providers and whether each is configured
    Providers,

    /// Show the stored Apple user identifier
    AppleUser {
        /// Delete the stored identifier
        #[arg(long)]
        forget: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_from_path(&config_path)
        .with_context(|| format!("failed to load configuration from {:?}", config_path))?;

    init_logging(cli.verbose, &config.log_level);
    debug!("loaded configuration from {:?}", config.config_path);

    match cli.command {
        Commands::SignIn { provider, format } => sign_in(&config, provider, format).await,
        Commands::Providers => list_providers(&config),
        Commands::AppleUser { forget } => apple_user(&config, forget).await,
    }
}

fn init_logging(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn orchestrator(config: &SignonConfig, queue: MainQueue) -> Result<AuthOrchestrator, SignonError> {
    let registry = registry_from_config(config, Arc::new(TerminalPresenter))?;
    let resolver = PresentationResolver::new(Arc::new(terminal_windows()));

    Ok(AuthOrchestrator::new(registry, resolver).with_executor(Arc::new(queue)))
}

async fn sign_in(config: &SignonConfig, provider: ProviderKind, format: Format) -> Result<()> {
    let (queue, mut ui) = MainQueue::new();
    let orchestrator = orchestrator(config, queue)?;

    let (tx, mut outcomes) = mpsc::unbounded_channel::<Result<AuthResult, AuthError>>();
    let on_error = tx.clone();
    let attempt = orchestrator.begin_sign_in(
        provider,
        move |result| {
            let _ = tx.send(Ok(result));
        },
        move |error| {
            let _ = on_error.send(Err(error));
        },
    );
    info!(%attempt, %provider, "sign-in started");

    // The UI loop: completion handlers only ever run from here.
    let outcome = loop {
        tokio::select! {
            ran = ui.run_next() => {
                if !ran {
                    return Err(anyhow!("UI queue closed before sign-in finished"));
                }
                if let Ok(outcome) = outcomes.try_recv() {
                    break outcome;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                return Err(anyhow!("interrupted"));
            }
        }
    };

    let result = outcome?;
    print_result(&result, format)
}

fn print_result(result: &AuthResult, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&result_json(result))?);
        }
        Format::Text => {
            println!("Signed in with {}", result.provider().display_name());
            println!("  User ID: {}", result.user_id());
            println!("  Email: {}", result.email().unwrap_or("-"));
            println!("  Name: {}", result.display_name().unwrap_or("-"));
            println!("  Access token: {}", presence(result.access_token().is_some()));
            println!("  ID token: {}", presence(result.id_token().is_some()));
            println!("  Identity token: {}", presence(result.identity_token().is_some()));
        }
    }
    Ok(())
}

/// Token values are never printed, only whether they were issued.
fn result_json(result: &AuthResult) -> serde_json::Value {
    serde_json::json!({
        "provider": result.provider(),
        "user_id": result.user_id(),
        "email": result.email(),
        "display_name": result.display_name(),
        "has_access_token": result.access_token().is_some(),
        "has_id_token": result.id_token().is_some(),
        "has_identity_token": result.identity_token().is_some(),
        "has_authorization_code": result.authorization_code().is_some(),
    })
}

fn presence(present: bool) -> &'static str {
    if present { "issued" } else { "-" }
}

fn list_providers(config: &SignonConfig) -> Result<()> {
    let (queue, _ui) = MainQueue::new();
    let configured = orchestrator(config, queue)?.configured_providers();

    println!("Providers:");
    for kind in ProviderKind::ALL {
        let status = if configured.contains(&kind) {
            "configured"
        } else {
            "not configured"
        };
        println!("  {:<8} {}", kind.as_str(), status);
    }
    Ok(())
}

async fn apple_user(config: &SignonConfig, forget: bool) -> Result<()> {
    if forget {
        forget_apple_user(config).await?;
        println!("Stored Apple user identifier removed");
        return Ok(());
    }

    match stored_apple_user(config).await? {
        Some(id) => println!("{}", id),
        None => println!("No Apple user identifier stored"),
    }
    Ok(())
}

async fn stored_apple_user(config: &SignonConfig) -> Result<Option<String>, SignonError> {
    let store = create_store(config.store.prefer_keyring, &config.store.service_name);
    let id = store.get(APPLE_USER_IDENTIFIER_KEY).await?;
    Ok(id.map(|secret| secret.expose().to_string()))
}

async fn forget_apple_user(config: &SignonConfig) -> Result<(), SignonError> {
    let store = create_store(config.store.prefer_keyring, &config.store.service_name);
    store.delete(APPLE_USER_IDENTIFIER_KEY).await?;
    Ok(())
}
