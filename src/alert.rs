//! Spoken-alert gating.
//!
//! Given the detections of one eligible frame, `AlertPolicy` decides which
//! signs are announced and remembers the last one spoken. Detections are
//! evaluated in detector order, each against the state left by the previous
//! one, so a single frame can raise several alerts.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::signs::SignClass;

/// Confidence a throttled alert has to exceed.
pub const DEFAULT_ALERT_THRESHOLD: f32 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AlertMode {
    /// Every detection is announced.
    Unthrottled,
    /// Announce only when `confidence > threshold` and the sign differs from
    /// the last one spoken.
    Throttled { threshold: f32 },
}

impl AlertMode {
    pub fn throttled() -> Self {
        AlertMode::Throttled {
            threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

impl Default for AlertMode {
    fn default() -> Self {
        Self::throttled()
    }
}

/// Session-scoped memory of the last sign actually spoken.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlertState {
    last_spoken: Option<SignClass>,
}

impl AlertState {
    pub fn last_spoken(&self) -> Option<SignClass> {
        self.last_spoken
    }
}

#[derive(Clone, Debug)]
pub struct AlertPolicy {
    mode: AlertMode,
    state: AlertState,
}

impl AlertPolicy {
    pub fn new(mode: AlertMode) -> Self {
        Self {
            mode,
            state: AlertState::default(),
        }
    }

    pub fn mode(&self) -> AlertMode {
        self.mode
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Decide which signs to announce for one eligible frame.
    ///
    /// Returns the signs in the order they should be spoken. Infallible.
    pub fn evaluate(&mut self, detections: &[Detection]) -> Vec<SignClass> {
        let mut alerts = Vec::new();
        for det in detections {
            if self.should_speak(det) {
                self.state.last_spoken = Some(det.sign);
                alerts.push(det.sign);
            }
        }
        alerts
    }

    fn should_speak(&self, det: &Detection) -> bool {
        match self.mode {
            AlertMode::Unthrottled => true,
            AlertMode::Throttled { threshold } => {
                det.confidence > threshold && self.state.last_spoken != Some(det.sign)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(sign: SignClass, confidence: f32) -> Detection {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        Detection::new(sign, confidence, bbox).unwrap()
    }

    #[test]
    fn throttled_suppresses_repeat_across_frames() {
        let mut policy = AlertPolicy::new(AlertMode::throttled());
        assert_eq!(policy.evaluate(&[det(SignClass::Stop, 0.9)]), vec![SignClass::Stop]);
        assert!(policy.evaluate(&[det(SignClass::Stop, 0.85)]).is_empty());
        assert_eq!(policy.state().last_spoken(), Some(SignClass::Stop));
    }

    #[test]
    fn throttled_ignores_low_confidence() {
        let mut policy = AlertPolicy::new(AlertMode::Throttled { threshold: 0.8 });
        assert!(policy.evaluate(&[det(SignClass::GiveWay, 0.75)]).is_empty());
        assert!(policy.evaluate(&[det(SignClass::GiveWay, 0.75)]).is_empty());
        assert_eq!(policy.state().last_spoken(), None);
    }

    #[test]
    fn throttled_threshold_is_strict() {
        let mut policy = AlertPolicy::new(AlertMode::Throttled { threshold: 0.8 });
        assert!(policy.evaluate(&[det(SignClass::Stop, 0.8)]).is_empty());
        assert_eq!(policy.state().last_spoken(), None);
    }

    #[test]
    fn throttled_announces_each_new_sign_in_order() {
        let mut policy = AlertPolicy::new(AlertMode::throttled());
        let mut spoken = policy.evaluate(&[det(SignClass::Stop, 0.9)]);
        spoken.extend(policy.evaluate(&[det(SignClass::GiveWay, 0.9)]));
        assert_eq!(spoken, vec![SignClass::Stop, SignClass::GiveWay]);
        assert_eq!(policy.state().last_spoken(), Some(SignClass::GiveWay));
    }

    #[test]
    fn throttled_frame_with_two_new_signs_raises_two_alerts() {
        let mut policy = AlertPolicy::new(AlertMode::throttled());
        let spoken = policy.evaluate(&[
            det(SignClass::Stop, 0.9),
            det(SignClass::GiveWay, 0.95),
            det(SignClass::GiveWay, 0.95),
        ]);
        assert_eq!(spoken, vec![SignClass::Stop, SignClass::GiveWay]);
        assert_eq!(policy.state().last_spoken(), Some(SignClass::GiveWay));
    }

    #[test]
    fn throttled_allows_a_sign_again_after_another_was_spoken() {
        let mut policy = AlertPolicy::new(AlertMode::throttled());
        let spoken = policy.evaluate(&[
            det(SignClass::Stop, 0.9),
            det(SignClass::GiveWay, 0.9),
            det(SignClass::Stop, 0.9),
        ]);
        assert_eq!(spoken, vec![SignClass::Stop, SignClass::GiveWay, SignClass::Stop]);
    }

    #[test]
    fn suppressed_candidate_does_not_touch_state() {
        let mut policy = AlertPolicy::new(AlertMode::throttled());
        policy.evaluate(&[det(SignClass::Stop, 0.9)]);
        policy.evaluate(&[det(SignClass::GiveWay, 0.5)]);
        assert_eq!(policy.state().last_spoken(), Some(SignClass::Stop));
    }

    #[test]
    fn unthrottled_announces_everything() {
        let mut policy = AlertPolicy::new(AlertMode::Unthrottled);
        let spoken = policy.evaluate(&[det(SignClass::Stop, 0.4), det(SignClass::Stop, 0.4)]);
        assert_eq!(spoken, vec![SignClass::Stop, SignClass::Stop]);
        assert_eq!(policy.state().last_spoken(), Some(SignClass::Stop));
    }

    #[test]
    fn empty_frame_raises_nothing() {
        for mode in [AlertMode::Unthrottled, AlertMode::throttled()] {
            let mut policy = AlertPolicy::new(mode);
            policy.evaluate(&[det(SignClass::Stop, 0.9)]);
            let before = policy.state().clone();
            assert!(policy.evaluate(&[]).is_empty());
            assert_eq!(policy.state(), &before);
        }
    }

    #[test]
    fn unknown_signs_are_announced_as_unknown() {
        let mut policy = AlertPolicy::new(AlertMode::throttled());
        let spoken = policy.evaluate(&[det(SignClass::from_class_id(42), 0.95)]);
        assert_eq!(spoken, vec![SignClass::Unknown]);
        assert_eq!(spoken[0].label(), "Unknown");
    }

    #[test]
    fn mode_deserializes_from_config() {
        let mode: AlertMode =
            serde_json::from_str(r#"{"mode": "throttled", "threshold": 0.6}"#).unwrap();
        assert_eq!(mode, AlertMode::Throttled { threshold: 0.6 });
        let mode: AlertMode = serde_json::from_str(r#"{"mode": "unthrottled"}"#).unwrap();
        assert_eq!(mode, AlertMode::Unthrottled);
    }
}
