use anyhow::{anyhow, Result};
use bip353::{Config, Resolver, SharedConfig};
use is_terminal::IsTerminal;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(3);
    let (program_name, address, config_file) = (
        first_args.next().unwrap_or("bip353".to_string()),
        first_args.next(),
        first_args.next(),
    );
    let Some(address) = address else {
        return Err(anyhow!(
            "usage: {program_name} <user@domain> [/path/to/config.json]"
        ));
    };

    let config = config_init(config_file)?;
    let resolver = Resolver::from_config(&config)?;
    tracing::debug!(
        "resolving on {} via {}",
        resolver.network(),
        config.dns_resolver
    );

    let instruction = tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
            return Ok(());
        },
        res = resolver.resolve(&address) => res?,
    };

    let output = if std::io::stdout().is_terminal() {
        serde_json::to_string_pretty(&instruction)?
    } else {
        serde_json::to_string(&instruction)?
    };
    println!("{output}");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bip353=info".into()),
        )
        .init();
}

fn config_init(config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Ok(Arc::new(Config::default())),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}
