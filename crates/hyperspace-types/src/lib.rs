//! `hyperspace-types` – shared vocabulary of the Hyperspace VR core.
//!
//! Identifiers, the seven-channel [`DofVector`], navigation and stereo modes,
//! the [`VisibilityPolicy`] value object and the global [`HyperError`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of channels in a [`DofVector`]: 3 translation, 3 rotation, 1 scale.
pub const DOF_CHANNELS: usize = 7;

/// Channel index of the discrete scale/trigger channel.
pub const SCALE_CHANNEL: usize = 6;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Identifier of a tracked user, issued by the user registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u32);

/// Identifier of a physical display, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayId(pub u32);

/// Identifier of a portal issued by the portal registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortalId(pub u32);

/// Identifier of a navigation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NavigationId(pub u32);

/// Hardware id of one pair of shutter glasses (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlassesId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display-{}", self.0)
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "portal-{}", self.0)
    }
}

impl fmt::Display for NavigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "navigation-{}", self.0)
    }
}

impl fmt::Display for GlassesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "glasses-{}", self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Input vector
// ────────────────────────────────────────────────────────────────────────────

/// Seven-channel relative input sample: `[x, y, z, rx, ry, rz, scale]`.
///
/// Translation and rotation channels are normalised to `[-1, 1]` by the
/// device input filters; the scale channel is a raw signed accumulation of
/// button events.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DofVector(pub [f64; DOF_CHANNELS]);

impl DofVector {
    /// The all-zero sample ("no input").
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build a sample from its translation, rotation and scale parts.
    pub fn from_parts(translation: [f64; 3], rotation: [f64; 3], scale: f64) -> Self {
        let [x, y, z] = translation;
        let [rx, ry, rz] = rotation;
        Self([x, y, z, rx, ry, rz, scale])
    }

    pub fn translation(&self) -> [f64; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn rotation(&self) -> [f64; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    pub fn scale(&self) -> f64 {
        self.0[SCALE_CHANNEL]
    }

    /// `true` when every channel is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl Index<usize> for DofVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for DofVector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Modes
// ────────────────────────────────────────────────────────────────────────────

/// Navigation movement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavMode {
    /// Height, pitch and roll input are ignored; ground following runs.
    GroundBased,
    /// Unconstrained six degrees of freedom.
    #[default]
    Free6Dof,
}

impl NavMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            NavMode::GroundBased => NavMode::Free6Dof,
            NavMode::Free6Dof => NavMode::GroundBased,
        }
    }
}

/// Stereo technique of a physical display, derived from its shutter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoMode {
    /// Mono display, no shutter commands.
    None,
    /// Two time values per slot half.
    PassiveStereo,
    /// Four time values per slot half.
    ActiveStereo,
}

// ────────────────────────────────────────────────────────────────────────────
// Visibility
// ────────────────────────────────────────────────────────────────────────────

/// Which viewers may see an object of a given owner tag.
///
/// Rules are keyed `owner tag -> viewer tag -> visible`.  Pairs without a rule
/// fall back to `default_visible`.
///
/// ```rust
/// use hyperspace_types::VisibilityPolicy;
///
/// let policy = VisibilityPolicy::new(true).with_rule("trace", "tracking_display", false);
/// assert!(!policy.is_visible("trace", "tracking_display"));
/// assert!(policy.is_visible("trace", "powerwall"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    #[serde(default = "default_visible")]
    pub default_visible: bool,
    #[serde(default)]
    pub rules: BTreeMap<String, BTreeMap<String, bool>>,
}

fn default_visible() -> bool {
    true
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VisibilityPolicy {
    pub fn new(default_visible: bool) -> Self {
        Self {
            default_visible,
            rules: BTreeMap::new(),
        }
    }

    /// Add or replace the rule for `(owner, viewer)`.
    pub fn with_rule(mut self, owner: &str, viewer: &str, visible: bool) -> Self {
        self.set_rule(owner, viewer, visible);
        self
    }

    pub fn set_rule(&mut self, owner: &str, viewer: &str, visible: bool) {
        self.rules
            .entry(owner.to_string())
            .or_default()
            .insert(viewer.to_string(), visible);
    }

    pub fn is_visible(&self, owner: &str, viewer: &str) -> bool {
        self.rules
            .get(owner)
            .and_then(|viewers| viewers.get(viewer))
            .copied()
            .unwrap_or(self.default_visible)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type spanning setup mistakes, shutter hardware failures and
/// malformed input bindings.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HyperError {
    /// Static wiring mistake (e.g. glasses id out of range).
    #[error("Configuration Error: {details}")]
    Config { details: String },

    /// Shutter controller or HID failure; retried on the next pass.
    #[error("Hardware Fault in {operation}: {details}")]
    HardwareFault { operation: String, details: String },

    /// A single device channel binding could not be evaluated.
    #[error("Input Binding Error in {binding}: {details}")]
    InputBinding { binding: String, details: String },

    #[error("Unknown Portal: {0}")]
    UnknownPortal(PortalId),

    #[error("Unknown Display: {0}")]
    UnknownDisplay(String),
}

impl HyperError {
    /// Shorthand for [`HyperError::Config`].
    pub fn config(details: impl Into<String>) -> Self {
        HyperError::Config {
            details: details.into(),
        }
    }

    /// Shorthand for [`HyperError::HardwareFault`].
    pub fn hardware(operation: impl Into<String>, details: impl Into<String>) -> Self {
        HyperError::HardwareFault {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// `true` for errors the frame loop recovers from by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HyperError::HardwareFault { .. } | HyperError::InputBinding { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dof_vector_parts() {
        let dof = DofVector::from_parts([1.0, 2.0, 3.0], [4.0, 5.0, 6.0], -1.0);
        assert_eq!(dof.translation(), [1.0, 2.0, 3.0]);
        assert_eq!(dof.rotation(), [4.0, 5.0, 6.0]);
        assert!((dof.scale() - (-1.0)).abs() < f64::EPSILON);
        assert!(!dof.is_zero());
        assert!(DofVector::zero().is_zero());
    }

    #[test]
    fn dof_vector_index_mut_accumulates() {
        let mut dof = DofVector::zero();
        dof[SCALE_CHANNEL] += 1.0;
        dof[SCALE_CHANNEL] += -1.0;
        dof[2] += 0.5;
        assert!(dof[SCALE_CHANNEL].abs() < f64::EPSILON);
        assert!((dof[2] - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn nav_mode_toggle() {
        assert_eq!(NavMode::GroundBased.toggled(), NavMode::Free6Dof);
        assert_eq!(NavMode::Free6Dof.toggled(), NavMode::GroundBased);
        assert_eq!(NavMode::default(), NavMode::Free6Dof);
    }

    #[test]
    fn nav_mode_serializes_snake_case() {
        let json = serde_json::to_string(&NavMode::GroundBased).unwrap();
        assert_eq!(json, "\"ground_based\"");
        let back: StereoMode = serde_json::from_str("\"active_stereo\"").unwrap();
        assert_eq!(back, StereoMode::ActiveStereo);
    }

    #[test]
    fn visibility_policy_falls_back_to_default() {
        let policy = VisibilityPolicy::new(false).with_rule("avatar", "desktop", true);
        assert!(policy.is_visible("avatar", "desktop"));
        assert!(!policy.is_visible("avatar", "powerwall"));
        assert!(!policy.is_visible("tool", "desktop"));
    }

    #[test]
    fn visibility_policy_rule_replacement() {
        let mut policy = VisibilityPolicy::default();
        policy.set_rule("trace", "wall", false);
        policy.set_rule("trace", "wall", true);
        assert!(policy.is_visible("trace", "wall"));
        assert_eq!(policy.rules["trace"].len(), 1);
    }

    #[test]
    fn visibility_policy_deserializes_with_defaults() {
        let policy: VisibilityPolicy = serde_json::from_str("{}").unwrap();
        assert!(policy.default_visible);
        assert!(policy.rules.is_empty());
    }

    #[test]
    fn hyper_error_display() {
        let err = HyperError::hardware("send_shutter_config", "error: device busy");
        assert!(err.to_string().contains("Hardware Fault"));
        assert!(err.to_string().contains("device busy"));
        assert!(err.is_recoverable());
        assert!(!HyperError::config("glasses id 9 exceeds 6").is_recoverable());
        assert!(HyperError::UnknownPortal(PortalId(3)).to_string().contains("portal-3"));
    }
}
