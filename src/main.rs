mod cli;

use clap::{Parser, Subcommand};
use cli::{
    config::ConfigSubcommand, contacts::ContactsSubcommand, keywords::KeywordsSubcommand,
};

#[derive(Parser)]
#[command(
    name = "aurora",
    about = "Keyword-triggered emergency alerts from continuous speech recognition",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run protection, reading transcript lines from stdin
    Listen,

    /// Manage emergency contacts
    Contacts {
        #[command(subcommand)]
        subcommand: ContactsSubcommand,
    },

    /// Manage trigger keywords
    Keywords {
        #[command(subcommand)]
        subcommand: KeywordsSubcommand,
    },

    /// Show recent alert cycles
    History {
        /// Number of alerts to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Inspect or reset the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();
    aurora_lib::logging::init_logging();

    let result = match cli.command {
        Commands::Listen => cli::listen::run(cli.json),
        Commands::Contacts { subcommand } => cli::contacts::run(subcommand, cli.json),
        Commands::Keywords { subcommand } => cli::keywords::run(subcommand, cli.json),
        Commands::History { limit } => cli::history::run(limit, cli.json),
        Commands::Config { subcommand } => cli::config::run(subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
