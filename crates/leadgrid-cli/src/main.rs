use clap::{Parser, Subcommand};

mod harvest;

#[derive(Debug, Parser)]
#[command(name = "leadgrid")]
#[command(about = "Geo-grid business lead harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a harvest over a disk-shaped search area and export the results.
    Harvest(harvest::HarvestArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = leadgrid_core::load_app_config_from_env()?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Harvest(args) => harvest::run_harvest(&config, args).await,
    }
}
