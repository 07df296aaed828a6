//! Closed vocabularies shared by both sides of the pipe.
//!
//! Every name that crosses the pipe or lands in the mapping file is one of these
//! enums. Parsing goes through `FromStr`, so an unknown name is rejected at the
//! boundary instead of being carried around as a string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A name that is not part of one of the closed vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} name: {name:?} (valid: {valid})")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
    pub valid: String,
}

impl UnknownName {
    fn new(kind: &'static str, name: &str, valid: &[&str]) -> Self {
        Self {
            kind,
            name: name.to_string(),
            valid: valid.join(", "),
        }
    }
}

/// Controller buttons accepted by the remote-play side.
///
/// Declaration order is the fixed ordering used whenever events for several
/// buttons are produced in the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Button {
    Cross,
    Circle,
    Square,
    Triangle,
    L1,
    L2,
    R1,
    R2,
    L3,
    R3,
    Up,
    Down,
    Left,
    Right,
    Options,
    Ps,
}

impl Button {
    pub const ALL: [Button; 16] = [
        Button::Cross,
        Button::Circle,
        Button::Square,
        Button::Triangle,
        Button::L1,
        Button::L2,
        Button::R1,
        Button::R2,
        Button::L3,
        Button::R3,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Options,
        Button::Ps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Button::Cross => "CROSS",
            Button::Circle => "CIRCLE",
            Button::Square => "SQUARE",
            Button::Triangle => "TRIANGLE",
            Button::L1 => "L1",
            Button::L2 => "L2",
            Button::R1 => "R1",
            Button::R2 => "R2",
            Button::L3 => "L3",
            Button::R3 => "R3",
            Button::Up => "UP",
            Button::Down => "DOWN",
            Button::Left => "LEFT",
            Button::Right => "RIGHT",
            Button::Options => "OPTIONS",
            Button::Ps => "PS",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Button::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Button::ALL.iter().map(|b| b.as_str()).collect();
                UnknownName::new("button", s, &valid)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Press,
    Release,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Press => "press",
            Action::Release => "release",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "press" => Ok(Action::Press),
            "release" => Ok(Action::Release),
            other => Err(UnknownName::new("action", other, &["press", "release"])),
        }
    }
}

/// Analog sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stick::Left => "LEFT",
            Stick::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Stick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stick {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEFT" => Ok(Stick::Left),
            "RIGHT" => Ok(Stick::Right),
            other => Err(UnknownName::new("stick", other, &["LEFT", "RIGHT"])),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            other => Err(UnknownName::new("axis", other, &["x", "y"])),
        }
    }
}

/// A press or release of one button, as emitted by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEvent {
    pub button: Button,
    pub action: Action,
}

impl ButtonEvent {
    pub fn press(button: Button) -> Self {
        Self {
            button,
            action: Action::Press,
        }
    }

    pub fn release(button: Button) -> Self {
        Self {
            button,
            action: Action::Release,
        }
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.button, self.action)
    }
}
