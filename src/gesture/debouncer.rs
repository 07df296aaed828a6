//! Edge-triggered press/release tracking.

use super::{Gesture, GestureFrame};
use crate::controller::{Button, ButtonEvent};
use crate::persistence::GestureMappingTable;
use std::collections::BTreeSet;
use tracing::debug;

/// Tracks which buttons are held and emits events only on transitions.
///
/// A button is held while any gesture mapped to it is detected. Presses are
/// emitted in gesture declaration order, releases in button declaration order,
/// so the output never depends on hash iteration.
#[derive(Debug, Default)]
pub struct EventDebouncer {
    active: BTreeSet<Button>,
}

impl EventDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &BTreeSet<Button> {
        &self.active
    }

    pub fn update(&mut self, frame: &GestureFrame, mappings: &GestureMappingTable) -> Vec<ButtonEvent> {
        let mut now_active = BTreeSet::new();
        let mut events = Vec::new();

        for gesture in Gesture::ALL {
            let Some(button) = mappings.get(gesture) else {
                continue;
            };
            let detected = frame.get(&gesture).copied().unwrap_or(false);
            if detected && now_active.insert(button) && !self.active.contains(&button) {
                debug!("{} detected, pressing {}", gesture, button);
                events.push(ButtonEvent::press(button));
            }
        }

        for button in self.active.difference(&now_active) {
            debug!("Releasing {}", button);
            events.push(ButtonEvent::release(*button));
        }

        self.active = now_active;
        events
    }

    /// Releases every held button and empties the set.
    pub fn drain(&mut self) -> Vec<ButtonEvent> {
        std::mem::take(&mut self.active)
            .into_iter()
            .map(ButtonEvent::release)
            .collect()
    }
}
