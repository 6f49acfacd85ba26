//! Emergency contact store.
//!
//! Contacts are always read back in ascending priority; the first contact is
//! the primary one and the only one that receives a voice call.

use chrono::Utc;
use parking_lot::RwLock;
use regex::Regex;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::database::{Database, DatabaseError};

/// An emergency contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Unique identifier (UUID).
    pub id: String,
    /// Display name used in alert messages.
    pub name: String,
    /// Phone number as entered by the user.
    pub phone: String,
    /// Position in the call order; lower is higher priority.
    pub priority: i64,
    /// When the contact was created (RFC 3339).
    pub created_at: String,
    /// When the contact was last reordered (RFC 3339).
    pub updated_at: Option<String>,
}

impl Contact {
    /// Creates an unsaved contact with a generated UUID.
    pub fn new(name: impl Into<String>, phone: impl Into<String>, priority: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            phone: phone.into(),
            priority,
            created_at: Utc::now().to_rfc3339(),
            updated_at: None,
        }
    }

    /// Phone number with spacing and punctuation removed, ready for dialling.
    pub fn dial_number(&self) -> String {
        normalise_phone(&self.phone)
    }
}

/// Spacing and punctuation allowed in a phone number as entered.
static PHONE_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s()-]").unwrap());

/// Strip whitespace, parentheses and hyphens from a phone number; `+` is kept.
pub fn normalise_phone(phone: &str) -> String {
    PHONE_PUNCTUATION.replace_all(phone.trim(), "").into_owned()
}

/// Read access to the current contact list, in priority order.
///
/// The alert pipeline takes one snapshot per alert cycle and never holds a
/// live reference while dispatching.
pub trait ContactSource: Send + Sync {
    fn snapshot(&self) -> Result<Vec<Contact>, DatabaseError>;
}

impl ContactSource for Database {
    fn snapshot(&self) -> Result<Vec<Contact>, DatabaseError> {
        self.list_contacts()
    }
}

impl ContactSource for RwLock<Vec<Contact>> {
    fn snapshot(&self) -> Result<Vec<Contact>, DatabaseError> {
        let mut contacts = self.read().clone();
        contacts.sort_by_key(|c| c.priority);
        Ok(contacts)
    }
}

/// Column list for all SELECT queries.
const SELECT_COLUMNS: &str = "id, name, phone, priority, created_at, updated_at";

/// Map a database row to a Contact struct.
fn row_to_contact(row: &rusqlite::Row) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        priority: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl Database {
    /// Lists all contacts in ascending priority.
    pub fn list_contacts(&self) -> Result<Vec<Contact>, DatabaseError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM contacts ORDER BY priority ASC, created_at ASC",
                SELECT_COLUMNS
            ))?;
            let contacts = stmt
                .query_map([], row_to_contact)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(contacts)
        })
    }

    /// Retrieves a contact by its ID.
    pub fn get_contact(&self, id: &str) -> Result<Option<Contact>, DatabaseError> {
        self.with_connection(|conn| {
            let contact = conn
                .query_row(
                    &format!("SELECT {} FROM contacts WHERE id = ?1", SELECT_COLUMNS),
                    params![id],
                    row_to_contact,
                )
                .optional()?;
            Ok(contact)
        })
    }

    /// Adds a contact at the lowest priority (max + 1, or 0 for the first).
    pub fn add_contact(&self, name: &str, phone: &str) -> Result<Contact, DatabaseError> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() {
            return Err(DatabaseError::InvalidContact(
                "Name cannot be empty".to_string(),
            ));
        }
        if !phone.chars().any(|c| c.is_ascii_digit()) {
            return Err(DatabaseError::InvalidContact(format!(
                "'{}' is not a phone number",
                phone
            )));
        }

        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let priority: i64 = tx.query_row(
                "SELECT COALESCE(MAX(priority) + 1, 0) FROM contacts",
                [],
                |row| row.get(0),
            )?;

            let contact = Contact::new(name, phone, priority);
            tx.execute(
                "INSERT INTO contacts (id, name, phone, priority, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    contact.id,
                    contact.name,
                    contact.phone,
                    contact.priority,
                    contact.created_at,
                    contact.updated_at,
                ],
            )?;
            tx.commit()?;

            tracing::info!(
                "Added contact {} with priority {}",
                contact.id,
                contact.priority
            );
            Ok(contact)
        })
    }

    /// Deletes a contact. Remaining priorities are left as they are.
    pub fn delete_contact(&self, id: &str) -> Result<(), DatabaseError> {
        self.with_connection(|conn| {
            let rows_affected = conn.execute("DELETE FROM contacts WHERE id = ?1", params![id])?;
            if rows_affected == 0 {
                return Err(DatabaseError::ContactNotFound(id.to_string()));
            }
            tracing::info!("Deleted contact {}", id);
            Ok(())
        })
    }

    /// Assigns priorities 0..N-1 following `ordered_ids`.
    ///
    /// `ordered_ids` must name every stored contact exactly once. The update is
    /// a single transaction, so a failure leaves the previous order intact.
    pub fn reorder_contacts(&self, ordered_ids: &[String]) -> Result<Vec<Contact>, DatabaseError> {
        let requested: HashSet<&str> = ordered_ids.iter().map(String::as_str).collect();
        if requested.len() != ordered_ids.len() {
            return Err(DatabaseError::InvalidReorder(
                "duplicate contact id".to_string(),
            ));
        }

        self.with_connection(|conn| {
            let tx = conn.transaction()?;

            let stored: HashSet<String> = {
                let mut stmt = tx.prepare("SELECT id FROM contacts")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<HashSet<_>, _>>()?;
                ids
            };
            if stored.len() != requested.len()
                || !stored.iter().all(|id| requested.contains(id.as_str()))
            {
                return Err(DatabaseError::InvalidReorder(format!(
                    "expected {} ids, got {}",
                    stored.len(),
                    ordered_ids.len()
                )));
            }

            let now = Utc::now().to_rfc3339();
            for (priority, id) in ordered_ids.iter().enumerate() {
                tx.execute(
                    "UPDATE contacts SET priority = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, priority as i64, now],
                )?;
            }
            tx.commit()?;
            Ok(())
        })?;

        tracing::info!("Reordered {} contacts", ordered_ids.len());
        self.list_contacts()
    }

    /// Number of stored contacts.
    pub fn count_contacts(&self) -> Result<usize, DatabaseError> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_with(names: &[&str]) -> (Database, Vec<Contact>) {
        let db = Database::open_in_memory().unwrap();
        let contacts = names
            .iter()
            .enumerate()
            .map(|(i, name)| db.add_contact(name, &format!("+61 400 000 00{}", i)).unwrap())
            .collect();
        (db, contacts)
    }

    #[test]
    fn test_add_assigns_increasing_priorities() {
        let (db, contacts) = database_with(&["Alice", "Bob", "Carol"]);
        let priorities: Vec<i64> = contacts.iter().map(|c| c.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2]);
        assert_eq!(db.count_contacts().unwrap(), 3);
    }

    #[test]
    fn test_add_after_delete_uses_max_plus_one() {
        let (db, contacts) = database_with(&["Alice", "Bob"]);
        db.delete_contact(&contacts[0].id).unwrap();

        let dave = db.add_contact("Dave", "0400 000 009").unwrap();
        assert_eq!(dave.priority, 2);
    }

    #[test]
    fn test_add_rejects_invalid_input() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.add_contact("  ", "0400 000 000"),
            Err(DatabaseError::InvalidContact(_))
        ));
        assert!(matches!(
            db.add_contact("Alice", "no digits"),
            Err(DatabaseError::InvalidContact(_))
        ));
    }

    #[test]
    fn test_list_is_priority_ordered() {
        let (db, _) = database_with(&["Alice", "Bob", "Carol"]);
        let names: Vec<String> = db.list_contacts().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_get_contact() {
        let (db, contacts) = database_with(&["Alice"]);
        let found = db.get_contact(&contacts[0].id).unwrap();
        assert_eq!(found, Some(contacts[0].clone()));
        assert_eq!(db.get_contact("missing").unwrap(), None);
    }

    #[test]
    fn test_delete_missing_contact() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.delete_contact("missing"),
            Err(DatabaseError::ContactNotFound(_))
        ));
    }

    #[test]
    fn test_reorder_relabels_contiguously() {
        let (db, contacts) = database_with(&["Alice", "Bob", "Carol"]);
        let new_order = vec![
            contacts[2].id.clone(),
            contacts[0].id.clone(),
            contacts[1].id.clone(),
        ];

        let reordered = db.reorder_contacts(&new_order).unwrap();

        let ids: Vec<&str> = reordered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, new_order.iter().map(String::as_str).collect::<Vec<_>>());
        let priorities: Vec<i64> = reordered.iter().map(|c| c.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2]);
        assert!(reordered.iter().all(|c| c.updated_at.is_some()));
    }

    #[test]
    fn test_reorder_rejects_partial_or_duplicate_lists() {
        let (db, contacts) = database_with(&["Alice", "Bob"]);

        let partial = vec![contacts[0].id.clone()];
        assert!(matches!(
            db.reorder_contacts(&partial),
            Err(DatabaseError::InvalidReorder(_))
        ));

        let duplicate = vec![contacts[0].id.clone(), contacts[0].id.clone()];
        assert!(matches!(
            db.reorder_contacts(&duplicate),
            Err(DatabaseError::InvalidReorder(_))
        ));

        let unknown = vec![contacts[0].id.clone(), "stranger".to_string()];
        assert!(db.reorder_contacts(&unknown).is_err());

        // Original order survives the failed attempts
        let names: Vec<String> = db.list_contacts().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_normalise_phone() {
        assert_eq!(normalise_phone("+61 (400) 123-456"), "+61400123456");
        assert_eq!(normalise_phone(" 0400\t123 456 "), "0400123456");
        assert_eq!(normalise_phone("+15551234567"), "+15551234567");
    }

    #[test]
    fn test_contact_serialises_camel_case() {
        let contact = Contact::new("Alice", "0400", 0);
        let json = serde_json::to_string(&contact).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"updatedAt\":null"));
    }

    #[test]
    fn test_rwlock_source_sorts_by_priority() {
        let source = RwLock::new(vec![
            Contact::new("Bob", "2", 1),
            Contact::new("Alice", "1", 0),
        ]);
        let snapshot = source.snapshot().unwrap();
        assert_eq!(snapshot[0].name, "Alice");
    }
}
