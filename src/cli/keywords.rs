use aurora_lib::config::{get_config, set_keywords_config};
use aurora_lib::keywords::KeywordSet;
use clap::Subcommand;

use super::output::print_json;

#[derive(Subcommand)]
pub enum KeywordsSubcommand {
    /// List keywords in match order
    List,

    /// Add a keyword
    Add { keyword: String },

    /// Remove a keyword
    Remove { keyword: String },
}

pub fn run(subcmd: KeywordsSubcommand, json: bool) -> anyhow::Result<()> {
    let current = KeywordSet::new(&get_config().keywords.keywords);

    let updated = match subcmd {
        KeywordsSubcommand::List => current,
        KeywordsSubcommand::Add { keyword } => save(current.with_added(&keyword)?)?,
        KeywordsSubcommand::Remove { keyword } => save(current.with_removed(&keyword)?)?,
    };

    if json {
        return print_json(&updated);
    }
    if updated.is_empty() {
        println!("No keywords configured");
    }
    for keyword in updated.iter() {
        println!("{}", keyword);
    }
    Ok(())
}

fn save(keywords: KeywordSet) -> anyhow::Result<KeywordSet> {
    set_keywords_config(keywords.clone().into_vec())?;
    Ok(keywords)
}
