use anyhow::Result;
use clap::Parser;
use kexplain::{Cli, Commands, config};
use tracing_log::AsTrace;

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  tracing_subscriber::fmt()
    .with_max_level(cli.verbose.log_level_filter().as_trace())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match &cli.commands {
    Commands::Analyze(args) => kexplain::analyze(&cli, args).await?,
    Commands::Filters(args) => kexplain::filters(&config::path(cli.config.as_deref())?, args)?,
    Commands::Auth(args) => kexplain::auth(&config::path(cli.config.as_deref())?, args)?,
    Commands::Cache(args) => kexplain::cache(&config::path(cli.config.as_deref())?, args).await?,
  }

  Ok(())
}
