use anyhow::Context;
use aurora_lib::database::{Contact, Database};
use clap::Subcommand;

use super::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum ContactsSubcommand {
    /// List contacts in call order
    List,

    /// Add a contact at the end of the call order
    Add {
        /// Display name
        name: String,
        /// Phone number, any formatting
        phone: String,
    },

    /// Remove a contact
    Remove {
        /// Contact id
        id: String,
    },

    /// Set the call order; every contact id must be given exactly once
    Reorder {
        /// Contact ids, primary first
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

pub fn run(subcmd: ContactsSubcommand, json: bool) -> anyhow::Result<()> {
    let db = Database::open_default().context("failed to open contact database")?;

    match subcmd {
        ContactsSubcommand::List => {
            let contacts = db.list_contacts()?;
            show(&contacts, json)
        }
        ContactsSubcommand::Add { name, phone } => {
            let contact = db.add_contact(&name, &phone)?;
            if json {
                print_json(&contact)
            } else {
                println!(
                    "Added {} ({}) at position {}",
                    contact.name,
                    contact.phone,
                    contact.priority + 1
                );
                Ok(())
            }
        }
        ContactsSubcommand::Remove { id } => {
            db.delete_contact(&id)
                .with_context(|| format!("failed to remove contact '{id}'"))?;
            if json {
                print_json(&serde_json::json!({ "removed": id }))
            } else {
                println!("Removed contact {}", id);
                Ok(())
            }
        }
        ContactsSubcommand::Reorder { ids } => {
            let contacts = db.reorder_contacts(&ids)?;
            show(&contacts, json)
        }
    }
}

fn show(contacts: &[Contact], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&contacts);
    }

    let rows = contacts
        .iter()
        .enumerate()
        .map(|(index, c)| {
            vec![
                c.priority.to_string(),
                c.name.clone(),
                c.phone.clone(),
                if index == 0 { "yes" } else { "" }.to_string(),
                c.id.clone(),
            ]
        })
        .collect();
    print_table(&["#", "NAME", "PHONE", "PRIMARY", "ID"], rows);
    Ok(())
}
