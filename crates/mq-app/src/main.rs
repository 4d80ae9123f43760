use clap::Parser;

use mq_app::cli::{self, Cli};
use mq_app::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    let conf = AppConfig::load()?;

    cli::run(args, conf).await
}
