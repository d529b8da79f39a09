//! whalewhisper-relay - Streaming LLM relay for WhaleWhisper
//!
//! A local service that lets the WhaleWhisper client talk to many LLM
//! providers through one SSE chat endpoint and one provider settings API.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whalewhisper_relay::config::{Config, KeySource, LLM_KIND};
use whalewhisper_relay::relay::{EngineLookup, EnvSecrets, SecretResolver};
use whalewhisper_relay::server::run_server;

#[derive(Parser)]
#[command(name = "whalewhisper-relay")]
#[command(about = "Streaming LLM relay and provider compatibility layer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "relay.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "relay.toml")]
        config: String,
    },

    /// Show configured chat engines
    Engines {
        /// Path to configuration file
        #[arg(short, long, default_value = "relay.toml")]
        config: String,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("whalewhisper_relay={},tower_http=info", level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load config, falling back to default-level tracing so load errors are visible.
fn load(path: &str) -> anyhow::Result<(Config, Vec<(String, KeySource)>)> {
    match Config::from_file(path) {
        Ok((config, key_sources)) => {
            init_tracing(&config.logging.level);
            tracing::info!(config = %path, engines = config.engines.len(), "Loaded configuration");
            Ok((config, key_sources))
        }
        Err(e) => {
            init_tracing("info");
            tracing::error!(config = %path, error = %e, "Failed to load configuration");
            Err(e.into())
        }
    }
}

fn report_key_sources(key_sources: &[(String, KeySource)]) {
    for (engine, source) in key_sources {
        let resolved = EnvSecrets.resolve_api_key(source.var_name()).is_some();
        if resolved {
            tracing::info!(engine = %engine, source = %source, "API key available");
        } else {
            tracing::warn!(engine = %engine, source = %source, "API key not set - requests go out without Authorization");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let (mut config, key_sources) = load(&config)?;
            report_key_sources(&key_sources);

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let (config, key_sources) = load(&config)?;
            report_key_sources(&key_sources);

            let default = config.get_default(LLM_KIND).map(|e| e.id);
            println!(
                "Configuration OK: {} engine(s), default llm engine: {}",
                config.engines.len(),
                default.as_deref().unwrap_or("<none>")
            );
            Ok(())
        }

        Commands::Engines { config } => {
            let (config, key_sources) = load(&config)?;
            let default = config.get_default(LLM_KIND).map(|e| e.id);

            for engine in &config.engines {
                let marker = if engine.kind == LLM_KIND && default.as_deref() == Some(&engine.id) {
                    " (default)"
                } else {
                    ""
                };
                let source = key_sources
                    .iter()
                    .find(|(id, _)| id == &engine.id)
                    .map(|(_, s)| s.to_string())
                    .unwrap_or_default();
                println!(
                    "{} [{}]{}\n  base_url: {}\n  model:    {}\n  api key:  {}\n  timeout:  {}s",
                    engine.id,
                    engine.kind,
                    marker,
                    engine.base_url.as_deref().unwrap_or("<missing>"),
                    engine.model.as_deref().unwrap_or("<missing>"),
                    source,
                    engine.timeout
                );
            }
            Ok(())
        }
    }
}
