//! simple-translator binary
//!
//! Serves the translation chain over HTTP

use anyhow::{Context, Result};
use clap::Parser;
use simple_translator::serve::{start_server, AppState, ServerConfig};
use simple_translator::{ProviderConfig, TranslationChain};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// simple-translator: translation chain served over HTTP
#[derive(Parser, Debug)]
#[command(name = "simple-translator")]
#[command(about = "Translate text with an LLM over HTTP", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Path prefix for the chain routes
    #[arg(long)]
    path: Option<String>,

    /// Model identifier sent to the completion endpoint
    #[arg(short, long)]
    model: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

/// Locate the server config file: explicit flag, then local, then home
fn find_config_file(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("./translator.toml");
        if local.exists() {
            return Some(local);
        }
        dirs::home_dir()
            .map(|home| home.join(".simple-translator").join("config.toml"))
            .filter(|path| path.exists())
    })
}

fn load_server_config(args: &Args, config_file: Option<&Path>) -> Result<ServerConfig> {
    let mut config = match config_file {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            ServerConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => ServerConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = &args.path {
        config = config.with_path(path);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the key may come from the real environment
    let dotenv = dotenvy::dotenv();

    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let args = Args::parse();

    let config_file = find_config_file(args.config.clone());
    let server_config = load_server_config(&args, config_file.as_deref())?;

    // Fail before binding when the credential is missing
    let mut provider_config = ProviderConfig::from_env()?;
    if let Some(model) = &args.model {
        provider_config = provider_config.with_model(model.clone());
    }

    let chain = TranslationChain::new(provider_config)?;

    if args.validate {
        println!("Configuration validation:");
        println!("  Listen: {}:{}", server_config.host, server_config.port);
        println!("  Routes: {}/{{invoke,batch,stream}}", server_config.path);
        println!("  Model: {}", chain.model());
        println!("  API base: {}", chain.api_base());
        println!("\n✓ Configuration is valid");
        return Ok(());
    }

    info!("Using model {} at {}", chain.model(), chain.api_base());

    start_server(AppState::new(chain, server_config)).await
}
