//! Alert history.
//!
//! One row per alert cycle: what triggered it and what the dispatch achieved.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::ContactOutcome;
use crate::database::{Database, DatabaseError};
use crate::location::Coordinates;

/// How an alert cycle's dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The provider answered with per-contact results
    Sent,
    /// The provider call failed as a whole
    Failed,
    /// No contacts were configured, nothing was sent
    Skipped,
}

impl DispatchOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent => "sent",
            DispatchOutcome::Failed => "failed",
            DispatchOutcome::Skipped => "skipped",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "sent" => DispatchOutcome::Sent,
            "skipped" => DispatchOutcome::Skipped,
            _ => DispatchOutcome::Failed,
        }
    }
}

/// A recorded alert cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub id: String,
    pub keyword: String,
    /// Transcript text that contained the keyword
    pub transcript: String,
    pub location: Option<Coordinates>,
    pub contact_count: usize,
    pub outcome: DispatchOutcome,
    pub results: Vec<ContactOutcome>,
    pub error_message: Option<String>,
    pub created_at: String,
}

impl AlertRecord {
    pub fn new(
        keyword: impl Into<String>,
        transcript: impl Into<String>,
        location: Option<Coordinates>,
        contact_count: usize,
        outcome: DispatchOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            keyword: keyword.into(),
            transcript: transcript.into(),
            location,
            contact_count,
            outcome,
            results: Vec::new(),
            error_message: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<(AlertRecord, Option<String>)> {
    let lat: Option<f64> = row.get(3)?;
    let lng: Option<f64> = row.get(4)?;
    let outcome: String = row.get(6)?;
    let record = AlertRecord {
        id: row.get(0)?,
        keyword: row.get(1)?,
        transcript: row.get(2)?,
        location: lat.zip(lng).map(|(lat, lng)| Coordinates { lat, lng }),
        contact_count: row.get::<_, i64>(5)? as usize,
        outcome: DispatchOutcome::parse(&outcome),
        results: Vec::new(),
        error_message: row.get(8)?,
        created_at: row.get(9)?,
    };
    Ok((record, row.get(7)?))
}

impl Database {
    /// Stores an alert cycle.
    pub fn record_alert(&self, record: &AlertRecord) -> Result<(), DatabaseError> {
        let results_json = if record.results.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.results)?)
        };

        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO alert_history (
                    id, keyword, transcript, location_lat, location_lng,
                    contact_count, outcome, results_json, error_message, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    record.id,
                    record.keyword,
                    record.transcript,
                    record.location.map(|l| l.lat),
                    record.location.map(|l| l.lng),
                    record.contact_count as i64,
                    record.outcome.as_str(),
                    results_json,
                    record.error_message,
                    record.created_at,
                ],
            )?;
            Ok(())
        })?;

        tracing::debug!("Recorded alert {} ({:?})", record.id, record.outcome);
        Ok(())
    }

    /// Lists alert cycles, newest first.
    pub fn list_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, DatabaseError> {
        let rows = self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, keyword, transcript, location_lat, location_lng,
                       contact_count, outcome, results_json, error_message, created_at
                FROM alert_history
                ORDER BY created_at DESC
                LIMIT ?1
                "#,
            )?;
            let rows = stmt
                .query_map(params![limit as i64], row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(mut record, results_json)| -> Result<AlertRecord, DatabaseError> {
                if let Some(json) = results_json {
                    record.results = serde_json::from_str(&json)?;
                }
                Ok(record)
            })
            .collect()
    }

    /// Number of recorded alert cycles.
    pub fn count_alerts(&self) -> Result<usize, DatabaseError> {
        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM alert_history", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{CallOutcome, SmsOutcome};

    #[test]
    fn test_record_and_list_alert() {
        let db = Database::open_in_memory().unwrap();

        let mut record = AlertRecord::new(
            "help",
            "please help me",
            Some(Coordinates {
                lat: -27.4698,
                lng: 153.0251,
            }),
            2,
            DispatchOutcome::Sent,
        );
        record.results = vec![
            ContactOutcome {
                contact_id: "c0".to_string(),
                sms: SmsOutcome::Sent,
                call: CallOutcome::Initiated,
            },
            ContactOutcome {
                contact_id: "c1".to_string(),
                sms: SmsOutcome::Failed,
                call: CallOutcome::NotApplicable,
            },
        ];
        db.record_alert(&record).unwrap();

        let alerts = db.list_alerts(10).unwrap();
        assert_eq!(alerts.len(), 1);
        let stored = &alerts[0];
        assert_eq!(stored.keyword, "help");
        assert_eq!(stored.outcome, DispatchOutcome::Sent);
        assert_eq!(stored.location, record.location);
        assert_eq!(stored.results, record.results);
    }

    #[test]
    fn test_record_without_location_or_results() {
        let db = Database::open_in_memory().unwrap();
        let mut record = AlertRecord::new("sos", "sos", None, 0, DispatchOutcome::Skipped);
        record.error_message = Some("No contacts".to_string());
        db.record_alert(&record).unwrap();

        let stored = &db.list_alerts(1).unwrap()[0];
        assert!(stored.location.is_none());
        assert!(stored.results.is_empty());
        assert_eq!(stored.outcome, DispatchOutcome::Skipped);
        assert_eq!(stored.error_message.as_deref(), Some("No contacts"));
    }

    #[test]
    fn test_list_alerts_newest_first_with_limit() {
        let db = Database::open_in_memory().unwrap();
        for (i, ts) in ["2026-01-01T00:00:00Z", "2026-01-03T00:00:00Z", "2026-01-02T00:00:00Z"]
            .iter()
            .enumerate()
        {
            let mut record =
                AlertRecord::new(format!("k{}", i), "t", None, 1, DispatchOutcome::Failed);
            record.created_at = ts.to_string();
            db.record_alert(&record).unwrap();
        }

        let alerts = db.list_alerts(2).unwrap();
        let keywords: Vec<&str> = alerts.iter().map(|a| a.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["k1", "k2"]);
        assert_eq!(db.count_alerts().unwrap(), 3);
    }
}
