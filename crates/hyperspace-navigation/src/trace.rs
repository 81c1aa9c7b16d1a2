//! Movement traces.
//!
//! A trace keeps the recent world positions of a navigation so other users
//! can see where it has been.  A new point is recorded once the navigation has
//! moved at least `max_length / capacity` since the last point, so a full
//! trace spans roughly `max_length` world units.

use std::collections::VecDeque;

use glam::DVec3;
use hyperspace_types::VisibilityPolicy;
use serde::{Deserialize, Serialize};

/// Owner tag under which trace visibility rules are stored.
pub const TRACE_TAG: &str = "trace";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_length")]
    pub max_length: f64,
    /// Viewer tag -> visible, e.g. `{ dlp_wall = false }`.
    #[serde(default)]
    pub visibility: VisibilityPolicy,
}

fn default_capacity() -> usize {
    100
}

fn default_max_length() -> f64 {
    50.0
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_length: default_max_length(),
            visibility: VisibilityPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MovementTrace {
    settings: TraceSettings,
    points: VecDeque<DVec3>,
}

impl MovementTrace {
    pub fn new(settings: TraceSettings) -> Self {
        Self {
            points: VecDeque::with_capacity(settings.capacity),
            settings,
        }
    }

    fn spacing(&self) -> f64 {
        if self.settings.capacity == 0 {
            return f64::INFINITY;
        }
        self.settings.max_length / self.settings.capacity as f64
    }

    /// Offer the current position; stored when far enough from the last one.
    pub fn record(&mut self, position: DVec3) {
        if self.settings.capacity == 0 {
            return;
        }
        let far_enough = self
            .points
            .back()
            .is_none_or(|last| last.distance(position) >= self.spacing());
        if !far_enough {
            return;
        }
        if self.points.len() == self.settings.capacity {
            self.points.pop_front();
        }
        self.points.push_back(position);
    }

    /// Drop the history and restart at `position`.
    pub fn clear(&mut self, position: DVec3) {
        self.points.clear();
        self.record(position);
    }

    pub fn points(&self) -> impl Iterator<Item = &DVec3> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether displays tagged `viewer` render this trace.
    pub fn is_visible_to(&self, viewer: &str) -> bool {
        self.settings.visibility.is_visible(TRACE_TAG, viewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_trace() -> MovementTrace {
        MovementTrace::new(TraceSettings {
            capacity: 3,
            max_length: 3.0,
            visibility: VisibilityPolicy::new(true).with_rule(TRACE_TAG, "dlp_wall", false),
        })
    }

    #[test]
    fn records_only_after_spacing() {
        let mut trace = small_trace();
        trace.record(DVec3::ZERO);
        trace.record(DVec3::new(0.5, 0.0, 0.0));
        assert_eq!(trace.len(), 1);
        trace.record(DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut trace = small_trace();
        for x in 0..5 {
            trace.record(DVec3::new(x as f64, 0.0, 0.0));
        }
        assert_eq!(trace.len(), 3);
        let first = trace.points().next().copied();
        assert_eq!(first, Some(DVec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn clear_restarts_at_position() {
        let mut trace = small_trace();
        trace.record(DVec3::ZERO);
        trace.record(DVec3::X * 2.0);
        trace.clear(DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.points().next().copied(), Some(DVec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn visibility_per_viewer() {
        let trace = small_trace();
        assert!(!trace.is_visible_to("dlp_wall"));
        assert!(trace.is_visible_to("portal"));
    }

    #[test]
    fn defaults_match_navigation_traces() {
        let s = TraceSettings::default();
        assert_eq!(s.capacity, 100);
        assert_eq!(s.max_length, 50.0);
    }
}
