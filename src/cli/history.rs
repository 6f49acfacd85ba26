use anyhow::Context;
use aurora_lib::database::{AlertRecord, Database, DispatchOutcome};

use super::output::{print_json, print_table};

pub fn run(limit: usize, json: bool) -> anyhow::Result<()> {
    let db = Database::open_default().context("failed to open alert history")?;
    let alerts = db.list_alerts(limit)?;

    if json {
        return print_json(&alerts);
    }

    let rows = alerts.iter().map(row).collect();
    print_table(&["WHEN", "KEYWORD", "OUTCOME", "SENT", "LOCATION"], rows);
    Ok(())
}

fn row(alert: &AlertRecord) -> Vec<String> {
    let outcome = match alert.outcome {
        DispatchOutcome::Sent => "sent".to_string(),
        DispatchOutcome::Skipped => "skipped".to_string(),
        DispatchOutcome::Failed => format!(
            "failed: {}",
            alert.error_message.as_deref().unwrap_or("unknown error")
        ),
    };
    let sent = alert
        .results
        .iter()
        .filter(|r| r.sms == aurora_lib::alert::SmsOutcome::Sent)
        .count();

    vec![
        alert.created_at.clone(),
        alert.keyword.clone(),
        outcome,
        format!("{}/{}", sent, alert.contact_count),
        alert
            .location
            .map(|l| format!("{:.5}, {:.5}", l.lat, l.lng))
            .unwrap_or_else(|| "-".to_string()),
    ]
}
