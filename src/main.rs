use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glass_proxy::cli::Flags;
use glass_proxy::config::Config;
use glass_proxy::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let flags = Flags::parse();

    let filter = if flags.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load_or_default(&flags.config)?;
    flags.apply(&mut config);
    config.validate()?;

    if flags.validate {
        tracing::info!("configuration is valid");
        return Ok(());
    }

    let server = Server::with_path(config, flags.config.clone());
    server.run().await?;

    Ok(())
}
