use clap::{Parser, Subcommand};
use rowbound::RowboundConfig;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::inspect::InspectArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.rowbound/rowbound.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved configuration.
    Config(ConfigArgs),

    /// List the tables of a database and their row counts.
    Inspect(InspectArgs),
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .init();
    }

    let config = match RowboundConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Config(args) => commands::config::run(&config, args),
        Commands::Inspect(args) => commands::inspect::run(&config, args),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
