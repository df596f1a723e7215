//! Pending fast-forward markers
//!
//! The session fast-forwards towards a target marker and pauses when the
//! cursor reaches it. The target is the first force-break marker still
//! ahead, or failing that the earliest marker ahead, so plain markers
//! before a `***!` are run through without pausing.

use std::collections::BTreeMap;

use crate::script::FastForward;

/// Markers the cursor has not yet moved past, keyed by frame
#[derive(Debug, Clone, Default)]
pub struct PendingFastForwards {
    markers: BTreeMap<u64, FastForward>,
}

impl PendingFastForwards {
    pub fn new(markers: &BTreeMap<u64, FastForward>) -> Self {
        Self {
            markers: markers.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, frame: u64) -> Option<&FastForward> {
        self.markers.get(&frame)
    }

    /// Is there a marker strictly ahead of `frame`?
    ///
    /// A marker at `frame` itself does not count, so sitting paused on the
    /// last marker does not keep fast-forwarding.
    pub fn has_pending(&self, frame: u64) -> bool {
        self.markers.range(frame.saturating_add(1)..).next().is_some()
    }

    /// Speed of the earliest remaining marker, or 1
    pub fn speed(&self) -> u32 {
        self.markers
            .first_key_value()
            .map_or(1, |(_, marker)| marker.speed)
    }

    /// Marker playback is heading for from `frame`
    pub fn target(&self, frame: u64) -> Option<&FastForward> {
        let mut ahead = self.markers.range(frame..).map(|(_, marker)| marker);
        ahead
            .clone()
            .find(|marker| marker.force_break)
            .or_else(|| ahead.next())
    }

    /// Should playback pause on arriving at `frame`?
    pub fn should_break(&self, frame: u64) -> bool {
        self.target(frame).is_some_and(|marker| marker.frame == frame)
            || self.get(frame).is_some_and(|marker| marker.force_break)
    }

    /// Drop every marker before `frame`
    pub fn consume(&mut self, frame: u64) {
        self.markers = self.markers.split_off(&frame);
    }
}
