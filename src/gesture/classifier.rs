//! Per-frame threshold classifier.
//!
//! Everything here is a pure function of the snapshots and thresholds passed
//! in. The classifier never keeps landmark state of its own; the caller owns
//! the current/previous pair.

use super::landmarks::{LandmarkId, LandmarkSnapshot};
use super::{Gesture, GestureFrame, GestureKind};
use crate::controller::UnknownName;
use crate::persistence::ThresholdConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How "elbow raise" combines the position and the motion check.
///
/// There is no default; the operator has to pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaiseStrategy {
    /// Limb held above the anchor, or moving up fast while above it.
    PositionOrMotion,
    /// Limb moving up fast and already above the anchor by `raise_minimum`.
    MotionAndPosition,
}

impl RaiseStrategy {
    pub const ALL: [RaiseStrategy; 2] = [
        RaiseStrategy::PositionOrMotion,
        RaiseStrategy::MotionAndPosition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RaiseStrategy::PositionOrMotion => "position_or_motion",
            RaiseStrategy::MotionAndPosition => "motion_and_position",
        }
    }
}

impl fmt::Display for RaiseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RaiseStrategy {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RaiseStrategy::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "raise strategy",
                name: s.to_string(),
                valid: "position_or_motion, motion_and_position".to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureClassifier {
    strategy: RaiseStrategy,
}

impl GestureClassifier {
    pub fn new(strategy: RaiseStrategy) -> Self {
        Self { strategy }
    }

    /// Detects a single gesture.
    ///
    /// Missing landmarks mean "not detected"; the subject simply left the frame.
    pub fn detect(
        &self,
        gesture: Gesture,
        current: &LandmarkSnapshot,
        previous: Option<&LandmarkSnapshot>,
        thresholds: &ThresholdConfig,
    ) -> bool {
        match gesture.kind() {
            GestureKind::Raise { limb, anchor } => {
                self.detect_raise(limb, anchor, current, previous, thresholds)
            }
            GestureKind::Forward { point } => detect_forward(point, current, previous, thresholds),
        }
    }

    /// Classifies every gesture in `gestures` for one frame.
    ///
    /// Without a current snapshot all gestures are reported as not detected.
    pub fn classify<I>(
        &self,
        gestures: I,
        current: Option<&LandmarkSnapshot>,
        previous: Option<&LandmarkSnapshot>,
        thresholds: &ThresholdConfig,
    ) -> GestureFrame
    where
        I: IntoIterator<Item = Gesture>,
    {
        gestures
            .into_iter()
            .map(|gesture| {
                let detected = current
                    .map(|snapshot| self.detect(gesture, snapshot, previous, thresholds))
                    .unwrap_or(false);
                (gesture, detected)
            })
            .collect()
    }

    fn detect_raise(
        &self,
        limb: LandmarkId,
        anchor: LandmarkId,
        current: &LandmarkSnapshot,
        previous: Option<&LandmarkSnapshot>,
        thresholds: &ThresholdConfig,
    ) -> bool {
        let (Some(limb_now), Some(anchor_now)) = (current.get(limb), current.get(anchor)) else {
            return false;
        };

        // y grows downward: positive means the limb is above the anchor
        let vertical_diff = anchor_now.y - limb_now.y;
        let is_raised = vertical_diff > thresholds.raise_minimum;

        let moving_up = previous
            .and_then(|p| p.get(limb))
            .map(|limb_before| limb_now.y - limb_before.y < -thresholds.delta_threshold);

        match (self.strategy, moving_up) {
            (RaiseStrategy::PositionOrMotion, None) => is_raised,
            (RaiseStrategy::PositionOrMotion, Some(up)) => {
                is_raised || (up && vertical_diff > 0.0)
            }
            (RaiseStrategy::MotionAndPosition, None) => false,
            (RaiseStrategy::MotionAndPosition, Some(up)) => up && is_raised,
        }
    }
}

fn detect_forward(
    point: LandmarkId,
    current: &LandmarkSnapshot,
    previous: Option<&LandmarkSnapshot>,
    thresholds: &ThresholdConfig,
) -> bool {
    let Some(before) = previous.and_then(|p| p.get(point)) else {
        return false;
    };
    let Some(now) = current.get(point) else {
        return false;
    };
    now.z - before.z > thresholds.delta_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::Point3;
    use chrono::Local;

    fn thresholds() -> ThresholdConfig {
        ThresholdConfig {
            delta_threshold: 0.05,
            raise_minimum: 0.1,
        }
    }

    fn snapshot(points: &[(LandmarkId, Point3)]) -> LandmarkSnapshot {
        points
            .iter()
            .fold(LandmarkSnapshot::new(Local::now()), |s, (id, p)| s.with(*id, *p))
    }

    fn left_arm(shoulder_y: f32, elbow_y: f32) -> LandmarkSnapshot {
        snapshot(&[
            (LandmarkId::LEFT_SHOULDER, Point3::new(0.6, shoulder_y, 0.0)),
            (LandmarkId::LEFT_ELBOW, Point3::new(0.7, elbow_y, 0.0)),
        ])
    }

    #[test]
    fn held_raise_is_detected_without_history() {
        let classifier = GestureClassifier::new(RaiseStrategy::PositionOrMotion);
        let current = left_arm(0.5, 0.3);
        assert!(classifier.detect(Gesture::LeftElbowRaise, &current, None, &thresholds()));

        let lowered = left_arm(0.5, 0.45);
        assert!(!classifier.detect(Gesture::LeftElbowRaise, &lowered, None, &thresholds()));
    }

    #[test]
    fn fast_upward_motion_counts_only_for_position_or_motion() {
        let previous = left_arm(0.5, 0.55);
        // slightly above the shoulder, well below raise_minimum
        let current = left_arm(0.5, 0.45);

        let lenient = GestureClassifier::new(RaiseStrategy::PositionOrMotion);
        assert!(lenient.detect(Gesture::LeftElbowRaise, &current, Some(&previous), &thresholds()));

        let strict = GestureClassifier::new(RaiseStrategy::MotionAndPosition);
        assert!(!strict.detect(Gesture::LeftElbowRaise, &current, Some(&previous), &thresholds()));
    }

    #[test]
    fn motion_and_position_needs_both() {
        let strict = GestureClassifier::new(RaiseStrategy::MotionAndPosition);
        let previous = left_arm(0.5, 0.4);
        let current = left_arm(0.5, 0.3);
        assert!(strict.detect(Gesture::LeftElbowRaise, &current, Some(&previous), &thresholds()));

        // held still: raised, but not moving
        assert!(!strict.detect(Gesture::LeftElbowRaise, &current, Some(&current), &thresholds()));
        // no history
        assert!(!strict.detect(Gesture::LeftElbowRaise, &current, None, &thresholds()));
    }

    #[test]
    fn upward_motion_below_the_shoulder_is_ignored() {
        let classifier = GestureClassifier::new(RaiseStrategy::PositionOrMotion);
        let previous = left_arm(0.5, 0.8);
        let current = left_arm(0.5, 0.6);
        assert!(!classifier.detect(Gesture::LeftElbowRaise, &current, Some(&previous), &thresholds()));
    }

    #[test]
    fn forward_push_needs_a_previous_frame() {
        let classifier = GestureClassifier::new(RaiseStrategy::PositionOrMotion);
        let previous = snapshot(&[(LandmarkId::RIGHT_WRIST, Point3::new(0.3, 0.5, -0.1))]);
        let current = snapshot(&[(LandmarkId::RIGHT_WRIST, Point3::new(0.3, 0.5, 0.0))]);

        assert!(classifier.detect(Gesture::RightArmForward, &current, Some(&previous), &thresholds()));
        assert!(!classifier.detect(Gesture::RightArmForward, &current, None, &thresholds()));
        assert!(!classifier.detect(Gesture::RightArmForward, &previous, Some(&current), &thresholds()));
    }

    #[test]
    fn missing_landmarks_are_not_detected() {
        let classifier = GestureClassifier::new(RaiseStrategy::PositionOrMotion);
        let only_shoulder = snapshot(&[(LandmarkId::RIGHT_SHOULDER, Point3::new(0.4, 0.5, 0.0))]);
        assert!(!classifier.detect(Gesture::RightElbowRaise, &only_shoulder, None, &thresholds()));
        assert!(!classifier.detect(
            Gesture::LeftArmForward,
            &only_shoulder,
            Some(&only_shoulder),
            &thresholds()
        ));
    }

    #[test]
    fn classify_reports_every_requested_gesture() {
        let classifier = GestureClassifier::new(RaiseStrategy::PositionOrMotion);
        let frame = classifier.classify(Gesture::ALL, Some(&left_arm(0.5, 0.3)), None, &thresholds());
        assert_eq!(frame.len(), 4);
        assert!(frame[&Gesture::LeftElbowRaise]);
        assert!(!frame[&Gesture::RightElbowRaise]);

        let empty = classifier.classify(Gesture::ALL, None, None, &thresholds());
        assert!(empty.values().all(|detected| !detected));
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!(
            "motion_and_position".parse::<RaiseStrategy>(),
            Ok(RaiseStrategy::MotionAndPosition)
        );
        assert!("both".parse::<RaiseStrategy>().is_err());
    }
}
