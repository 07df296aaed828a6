//! Landmark snapshots and the pose source interface.
//!
//! The pose model itself lives outside this crate. It hands over one
//! [`LandmarkSnapshot`] per processed frame through [`PoseSource`].

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Index of a pose landmark (MediaPipe Pose numbering, 0..33).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LandmarkId(u8);

impl LandmarkId {
    pub const COUNT: u8 = 33;

    pub const LEFT_SHOULDER: LandmarkId = LandmarkId(11);
    pub const RIGHT_SHOULDER: LandmarkId = LandmarkId(12);
    pub const LEFT_ELBOW: LandmarkId = LandmarkId(13);
    pub const RIGHT_ELBOW: LandmarkId = LandmarkId(14);
    pub const LEFT_WRIST: LandmarkId = LandmarkId(15);
    pub const RIGHT_WRIST: LandmarkId = LandmarkId(16);

    pub fn new(id: u8) -> Option<Self> {
        (id < Self::COUNT).then_some(Self(id))
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for LandmarkId {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        LandmarkId::new(id).ok_or_else(|| {
            format!(
                "landmark id {} out of range (0..{})",
                id,
                LandmarkId::COUNT
            )
        })
    }
}

impl From<LandmarkId> for u8 {
    fn from(id: LandmarkId) -> Self {
        id.0
    }
}

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalized landmark position. `y` grows downward, `z` is relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<[f32; 3]> for Point3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Point3> for [f32; 3] {
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Landmarks detected in a single frame.
///
/// Snapshots are values: the caller keeps the current and the previous one and
/// replaces the previous wholesale every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSnapshot {
    pub timestamp: DateTime<Local>,
    pub landmarks: HashMap<LandmarkId, Point3>,
}

impl LandmarkSnapshot {
    pub fn new(timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            landmarks: HashMap::new(),
        }
    }

    pub fn with(mut self, id: LandmarkId, point: Point3) -> Self {
        self.landmarks.insert(id, point);
        self
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Point3> {
        self.landmarks.get(&id)
    }
}

/// What a pose source produced for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFrame {
    Pose(LandmarkSnapshot),
    /// Frame processed, nobody in view.
    NoPose,
    /// The source will not produce any more frames.
    Finished,
}

/// Supplier of landmark snapshots, polled once per frame by the sensor loop.
pub trait PoseSource: Send {
    fn next_frame(&mut self) -> SourceFrame;
}

/// Pose source replaying recorded snapshots, one JSON document per line.
///
/// A `null` line is a frame without a pose. Lines that fail to parse count as
/// frames without a pose as well. The recording is read into memory up front,
/// so polling a frame never blocks the runtime.
pub struct ReplaySource {
    lines: VecDeque<String>,
    line_number: usize,
}

impl ReplaySource {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        let source = Self::from_text(&text);
        info!(
            "Replaying {} landmark lines from {}",
            source.lines.len(),
            path.display()
        );
        Ok(source)
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_owned).collect(),
            line_number: 0,
        }
    }
}

impl PoseSource for ReplaySource {
    fn next_frame(&mut self) -> SourceFrame {
        while let Some(line) = self.lines.pop_front() {
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return match serde_json::from_str::<Option<LandmarkSnapshot>>(trimmed) {
                Ok(Some(snapshot)) => SourceFrame::Pose(snapshot),
                Ok(None) => SourceFrame::NoPose,
                Err(e) => {
                    warn!("Skipping replay line {}: {}", self.line_number, e);
                    SourceFrame::NoPose
                }
            };
        }
        debug!("Replay finished after {} lines", self.line_number);
        SourceFrame::Finished
    }
}
