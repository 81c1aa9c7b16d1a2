//! Tracking daemon access.
//!
//! The daemon is polled once per frame for the absolute matrix of each named
//! target.  Targets that are not configured, or not currently reported, fall
//! back to a fixed default matrix: an untracked desktop user simply sits at
//! the default position instead of producing an error.

use glam::DMat4;

/// Source of absolute tracking matrices.
pub trait TrackingService: Send + Sync {
    /// Latest matrix reported for `target`, or `None` when unknown.
    fn get_transform(&self, target: &str) -> Option<DMat4>;
}

/// Reader for one tracked target with a default fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingTarget {
    name: Option<String>,
    default: DMat4,
}

impl TrackingTarget {
    /// Track `name`, falling back to `default` while it is not reported.
    pub fn new(name: impl Into<String>, default: DMat4) -> Self {
        Self {
            name: Some(name.into()),
            default,
        }
    }

    /// A reader that never queries the daemon.
    pub fn untracked(default: DMat4) -> Self {
        Self {
            name: None,
            default,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn default_matrix(&self) -> DMat4 {
        self.default
    }

    /// Current matrix of the target.
    pub fn resolve(&self, service: &dyn TrackingService) -> DMat4 {
        self.name
            .as_deref()
            .and_then(|name| service.get_transform(name))
            .unwrap_or(self.default)
    }
}
