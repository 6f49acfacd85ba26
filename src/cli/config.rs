use aurora_lib::config::{get_config, get_config_path, reset_config};
use clap::Subcommand;

use super::output::print_json;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the config file location
    Path,

    /// Print the active configuration
    Show,

    /// Restore the default configuration
    Reset,
}

pub fn run(subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Path => {
            let path = get_config_path();
            if json {
                print_json(&serde_json::json!({ "path": path }))
            } else {
                println!("{}", path.display());
                Ok(())
            }
        }
        // Config is JSON on disk, so both modes print JSON
        ConfigSubcommand::Show => print_json(&get_config()),
        ConfigSubcommand::Reset => {
            let config = reset_config()?;
            if json {
                print_json(&config)
            } else {
                println!("Configuration reset to defaults");
                Ok(())
            }
        }
    }
}
