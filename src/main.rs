use a3s_router::config::GatewayConfig;
use a3s_router::{Gateway, RouterError};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// A3S Router — entry point handler assembly for the A3S gateway
#[derive(Parser)]
#[command(name = "a3s-router", version, about)]
struct Cli {
    /// Path to configuration file (.toml)
    #[arg(short, long, default_value = "router.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and report router build errors
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, default_value = "router.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> a3s_router::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Validate { config: config_path }) = &cli.command {
        return validate_config(config_path).await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    tracing::info!("A3S Router v{}", env!("CARGO_PKG_VERSION"));

    let config = if std::path::Path::new(&cli.config).exists() {
        tracing::info!(config = cli.config, "Loading configuration");
        GatewayConfig::from_file(&cli.config).await?
    } else {
        tracing::warn!(config = cli.config, "Config file not found, using defaults");
        GatewayConfig::default()
    };

    let gateway = Gateway::new(config)?;
    gateway.start().await?;
    tracing::info!("Router ready, press Ctrl+C to stop");

    gateway.wait_for_shutdown().await
}

/// Parse, validate and dry-build a configuration file, printing diagnostics
async fn validate_config(path: &str) -> a3s_router::Result<()> {
    let config = GatewayConfig::from_file(path).await?;
    println!("✓ Config parsed successfully ({})", path);

    let gateway = Gateway::new(config)?;
    let handlers = gateway.build();
    let config = gateway.config();

    println!("  Entrypoints: {}", config.entrypoints.len());
    for name in config.entrypoint_names() {
        let built = if handlers.contains_key(&name) { "ok" } else { "failed" };
        println!("    - {} → {} ({})", name, config.entrypoints[&name].address, built);
    }
    println!("  Services:    {}", config.services.len());
    println!("  Middlewares: {}", config.middlewares.len());

    let mut disabled = 0;
    if let Some(runtime) = gateway.runtime() {
        println!("  Routers:     {}", runtime.routers.len());
        for (name, info) in &runtime.routers {
            match &info.err {
                Some(err) => {
                    disabled += 1;
                    println!("    ✗ {} → {}", name, err);
                }
                None => println!("    - {} → service:{} rule:{}", name, info.config.service, info.config.rule),
            }
        }
    }

    if disabled > 0 {
        return Err(RouterError::Config(format!(
            "{} router(s) failed to build",
            disabled
        )));
    }
    println!("✓ Configuration is valid");
    Ok(())
}
