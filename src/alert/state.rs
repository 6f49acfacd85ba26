//! Protection state machine
//!
//! Coarse phase of the alert pipeline. Recognition runs in `Listening` and
//! `Alerting`; a keyword match moves to `Alerting` and only the cool-down
//! timer brings the machine back.

use serde::{Deserialize, Serialize};

/// Protection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    /// Protection off, nothing captured
    #[default]
    Idle,
    /// Recognition running, waiting for a keyword
    Listening,
    /// Keyword matched, alert cycle in progress
    Alerting,
}

impl AlertPhase {
    /// Returns a human-readable description of the phase
    pub fn description(&self) -> &'static str {
        match self {
            AlertPhase::Idle => "Protection inactive",
            AlertPhase::Listening => "Listening for keywords",
            AlertPhase::Alerting => "Alerting contacts",
        }
    }
}

/// Events that can trigger phase transitions
#[derive(Debug, Clone)]
pub enum AlertEvent {
    /// User turned protection on
    Activate,
    /// User turned protection off
    Deactivate,
    /// The matcher found a keyword in the live transcript
    KeywordMatched { keyword: String },
    /// The alert cool-down ran out
    CoolDownElapsed,
}

/// Reason for entering a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    UserActivation,
    UserDeactivation,
    KeywordDetected { keyword: String },
    CoolDownElapsed,
}

/// Result of a phase transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub previous: AlertPhase,
    pub new_phase: AlertPhase,
    pub reason: TransitionReason,
}

/// Alert phase state machine
///
/// Not thread-safe on its own; the `AlertController` serialises access.
pub struct AlertStateMachine {
    phase: AlertPhase,
    /// Alert cycles entered since creation
    alerts_triggered: u64,
}

impl AlertStateMachine {
    /// Creates a new state machine in the Idle phase
    pub fn new() -> Self {
        Self {
            phase: AlertPhase::Idle,
            alerts_triggered: 0,
        }
    }

    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    pub fn alerts_triggered(&self) -> u64 {
        self.alerts_triggered
    }

    /// Process an event and return the transition result if a transition occurred
    ///
    /// Returns `None` if the event is not valid for the current phase. In
    /// particular a keyword match while already alerting is ignored.
    pub fn process_event(&mut self, event: AlertEvent) -> Option<TransitionResult> {
        let (new_phase, reason) = match (self.phase, event) {
            (AlertPhase::Idle, AlertEvent::Activate) => {
                (AlertPhase::Listening, TransitionReason::UserActivation)
            }

            (AlertPhase::Listening, AlertEvent::KeywordMatched { keyword }) => (
                AlertPhase::Alerting,
                TransitionReason::KeywordDetected { keyword },
            ),
            (AlertPhase::Listening | AlertPhase::Alerting, AlertEvent::Deactivate) => {
                (AlertPhase::Idle, TransitionReason::UserDeactivation)
            }

            (AlertPhase::Alerting, AlertEvent::CoolDownElapsed) => {
                (AlertPhase::Listening, TransitionReason::CoolDownElapsed)
            }

            _ => return None,
        };

        let result = TransitionResult {
            previous: self.phase,
            new_phase,
            reason,
        };
        self.apply_transition(&result);
        Some(result)
    }

    fn apply_transition(&mut self, result: &TransitionResult) {
        self.phase = result.new_phase;
        if result.new_phase == AlertPhase::Alerting {
            self.alerts_triggered += 1;
        }

        tracing::info!(
            "Alert phase transition: {:?} -> {:?} (reason: {:?})",
            result.previous,
            result.new_phase,
            result.reason
        );
    }
}

impl Default for AlertStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(keyword: &str) -> AlertEvent {
        AlertEvent::KeywordMatched {
            keyword: keyword.to_string(),
        }
    }

    #[test]
    fn test_initial_phase_is_idle() {
        let sm = AlertStateMachine::new();
        assert_eq!(sm.phase(), AlertPhase::Idle);
        assert_eq!(sm.alerts_triggered(), 0);
    }

    #[test]
    fn test_full_alert_cycle() {
        let mut sm = AlertStateMachine::new();

        let result = sm.process_event(AlertEvent::Activate).unwrap();
        assert_eq!(result.new_phase, AlertPhase::Listening);
        assert_eq!(result.reason, TransitionReason::UserActivation);

        let result = sm.process_event(matched("help")).unwrap();
        assert_eq!(result.previous, AlertPhase::Listening);
        assert_eq!(result.new_phase, AlertPhase::Alerting);
        assert_eq!(
            result.reason,
            TransitionReason::KeywordDetected {
                keyword: "help".to_string()
            }
        );

        let result = sm.process_event(AlertEvent::CoolDownElapsed).unwrap();
        assert_eq!(result.new_phase, AlertPhase::Listening);
        assert_eq!(sm.alerts_triggered(), 1);
    }

    #[test]
    fn test_match_ignored_outside_listening() {
        let mut sm = AlertStateMachine::new();
        assert!(sm.process_event(matched("help")).is_none());
        assert_eq!(sm.phase(), AlertPhase::Idle);

        sm.process_event(AlertEvent::Activate);
        sm.process_event(matched("help"));
        assert!(sm.process_event(matched("emergency")).is_none());
        assert_eq!(sm.phase(), AlertPhase::Alerting);
        assert_eq!(sm.alerts_triggered(), 1);
    }

    #[test]
    fn test_deactivate_from_listening_and_alerting() {
        let mut sm = AlertStateMachine::new();
        sm.process_event(AlertEvent::Activate);
        let result = sm.process_event(AlertEvent::Deactivate).unwrap();
        assert_eq!(result.new_phase, AlertPhase::Idle);

        sm.process_event(AlertEvent::Activate);
        sm.process_event(matched("help"));
        let result = sm.process_event(AlertEvent::Deactivate).unwrap();
        assert_eq!(result.previous, AlertPhase::Alerting);
        assert_eq!(sm.phase(), AlertPhase::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = AlertStateMachine::new();
        assert!(sm.process_event(AlertEvent::Deactivate).is_none());
        assert!(sm.process_event(AlertEvent::CoolDownElapsed).is_none());

        sm.process_event(AlertEvent::Activate);
        assert!(sm.process_event(AlertEvent::Activate).is_none());
        assert!(sm.process_event(AlertEvent::CoolDownElapsed).is_none());
        assert_eq!(sm.phase(), AlertPhase::Listening);
    }

    #[test]
    fn test_alert_count_survives_deactivation() {
        let mut sm = AlertStateMachine::new();
        sm.process_event(AlertEvent::Activate);
        sm.process_event(matched("help"));
        sm.process_event(AlertEvent::Deactivate);
        sm.process_event(AlertEvent::Activate);
        sm.process_event(matched("emergency"));
        assert_eq!(sm.alerts_triggered(), 2);
    }

    #[test]
    fn test_phase_serialisation() {
        assert_eq!(
            serde_json::to_string(&AlertPhase::Alerting).unwrap(),
            "\"alerting\""
        );
    }
}
