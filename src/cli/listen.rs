use anyhow::Context;
use aurora_lib::alert::{
    AlertController, AlertNotice, AlertPhase, AlertServices, HttpNotificationProvider,
};
use aurora_lib::config::get_config;
use aurora_lib::database::Database;
use aurora_lib::error::AuroraError;
use aurora_lib::location::{FixedPositionSource, LocationProvider};
use aurora_lib::speech::LineSpeechEngine;
use std::sync::Arc;

use super::output::print_json_line;

pub fn run(json: bool) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(listen(json))
}

async fn listen(json: bool) -> anyhow::Result<()> {
    let config = get_config();
    let db = Arc::new(Database::open_default().context("failed to open contact database")?);
    if db.count_contacts()? == 0 && !json {
        eprintln!("warning: no emergency contacts configured, alerts will not be sent");
    }

    let engine = Arc::new(LineSpeechEngine::stdin());
    let provider = Arc::new(
        HttpNotificationProvider::from_config(&config.notification)
            .context("invalid notification provider settings")?,
    );
    let location = Arc::new(LocationProvider::new(
        Arc::new(FixedPositionSource::new(config.location.fixed)),
        &config.location,
    ));

    let (controller, mut notices) = AlertController::new(
        &config,
        AlertServices {
            engine: engine.clone(),
            provider,
            contacts: db.clone(),
            location: Some(location),
            history: Some(db),
        },
    );
    controller.activate()?;

    if !json {
        let keywords: Vec<&str> = config.keywords.keywords.iter().map(String::as_str).collect();
        eprintln!("Listening for: {}", keywords.join(", "));
        eprintln!("Type transcript lines; Ctrl-D or Ctrl-C to stop.");
    }

    let mut closing = false;
    loop {
        tokio::select! {
            notice = notices.recv() => {
                let Some(notice) = notice else { break };
                print_notice(&notice, json)?;
                // Once input is gone, stay only until the pending alert settles
                if closing && settles_alert(&notice) {
                    break;
                }
            }
            _ = engine.closed(), if !closing => {
                closing = true;
                if controller.phase() != AlertPhase::Alerting {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.deactivate();
    while let Ok(notice) = notices.try_recv() {
        print_notice(&notice, json)?;
    }
    Ok(())
}

fn settles_alert(notice: &AlertNotice) -> bool {
    matches!(
        notice,
        AlertNotice::AlertsSent { .. }
            | AlertNotice::DispatchFailed { .. }
            | AlertNotice::NoContactsConfigured
            | AlertNotice::ContactsUnavailable { .. }
            | AlertNotice::PhaseChanged {
                phase: AlertPhase::Listening | AlertPhase::Idle
            }
    )
}

fn print_notice(notice: &AlertNotice, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json_line(notice);
    }

    match notice {
        AlertNotice::PhaseChanged { phase } => println!("[{}]", phase.description()),
        AlertNotice::KeywordDetected {
            keyword,
            transcript,
        } => println!("Keyword '{}' detected in \"{}\"", keyword, transcript.trim()),
        AlertNotice::AlertsSent {
            messages_sent,
            contacts,
        } => println!("Alerts sent: {}/{} messages delivered", messages_sent, contacts),
        AlertNotice::DispatchFailed { message } => println!("Alert failed: {}", message),
        AlertNotice::NoContactsConfigured => println!("{}", AuroraError::NoContactsConfigured),
        AlertNotice::ContactsUnavailable { message } => println!("Alert failed: {}", message),
        AlertNotice::RecognitionError { message, fatal } => {
            let label = if *fatal { "error" } else { "warning" };
            println!("Recognition {}: {}", label, message);
        }
    }
    Ok(())
}
