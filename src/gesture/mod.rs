//! Gesture pipeline: landmarks in, button events out.
//!
//! ```text
//! PoseSource ──► LandmarkSnapshot ──► GestureClassifier ──► GestureFrame ──► EventDebouncer ──► ButtonEvent
//!                (current/previous)   (pure, per frame)     (gesture→bool)   (edge-triggered)
//! ```

pub mod classifier;
pub mod debouncer;
pub mod landmarks;

pub use classifier::{GestureClassifier, RaiseStrategy};
pub use debouncer::EventDebouncer;
pub use landmarks::{LandmarkId, LandmarkSnapshot, Point3, PoseSource, ReplaySource, SourceFrame};

use crate::controller::UnknownName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Per-frame detection result for every classified gesture.
///
/// A `BTreeMap` so that iteration always follows the gesture declaration order.
pub type GestureFrame = BTreeMap<Gesture, bool>;

/// The gestures the classifier knows how to detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    LeftElbowRaise,
    RightElbowRaise,
    LeftArmForward,
    RightArmForward,
}

/// How a gesture is measured from landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// `limb` lifted above `anchor`.
    Raise { limb: LandmarkId, anchor: LandmarkId },
    /// `point` pushed toward the camera.
    Forward { point: LandmarkId },
}

impl Gesture {
    pub const ALL: [Gesture; 4] = [
        Gesture::LeftElbowRaise,
        Gesture::RightElbowRaise,
        Gesture::LeftArmForward,
        Gesture::RightArmForward,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::LeftElbowRaise => "left_elbow_raise",
            Gesture::RightElbowRaise => "right_elbow_raise",
            Gesture::LeftArmForward => "left_arm_forward",
            Gesture::RightArmForward => "right_arm_forward",
        }
    }

    pub fn kind(&self) -> GestureKind {
        match self {
            Gesture::LeftElbowRaise => GestureKind::Raise {
                limb: LandmarkId::LEFT_ELBOW,
                anchor: LandmarkId::LEFT_SHOULDER,
            },
            Gesture::RightElbowRaise => GestureKind::Raise {
                limb: LandmarkId::RIGHT_ELBOW,
                anchor: LandmarkId::RIGHT_SHOULDER,
            },
            Gesture::LeftArmForward => GestureKind::Forward {
                point: LandmarkId::LEFT_WRIST,
            },
            Gesture::RightArmForward => GestureKind::Forward {
                point: LandmarkId::RIGHT_WRIST,
            },
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gesture {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gesture::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "gesture",
                name: s.to_string(),
                valid: Gesture::ALL
                    .iter()
                    .map(|g| g.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
