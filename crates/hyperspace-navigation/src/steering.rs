//! Steering navigation.
//!
//! A [`NavigationState`] is the platform a group of users stands on.  It owns
//! a rigid platform matrix and a separate scale; the world matrix seen by the
//! scene is `transform * scale`.  Relative device input moves the platform,
//! the scale channel zooms it with snapping at power-of-ten levels, and in
//! ground-based mode the platform is kept on the ground geometry.
//!
//! All timing uses an internal clock advanced by [`NavigationState::tick`], so
//! behaviour is deterministic for a given sequence of frame durations.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use hyperspace_navigation::steering::{NavigationConfig, NavigationState};
//! use hyperspace_types::{DofVector, NavigationId};
//!
//! let mut nav = NavigationState::new(NavigationId(0), NavigationConfig::default()).unwrap();
//!
//! // Full forward deflection for one frame.
//! nav.apply_relative_input(&DofVector::from_parts([0.0, 0.0, -1.0], [0.0; 3], 0.0));
//! nav.tick(Duration::from_millis(16), None);
//!
//! assert!(nav.translation().z < 0.0);
//! ```

use std::time::Duration;

use glam::{DMat4, DQuat, DVec3};
use hyperspace_hal::GroundPicker;
use hyperspace_types::{DofVector, HyperError, NavMode, NavigationId};
use tracing::{debug, info};

use crate::ground::{GroundFollowing, GroundFollowingSettings};
use crate::math::{ease_cubic, rigid_part, rotation_of, rotation_ypr_degrees, round_to, translation_of, yaw_only};
use crate::trace::{MovementTrace, TraceSettings};

/// Scale levels the zoom stops at, checked from the largest down.
pub const SNAP_LEVELS: [f64; 7] = [1000.0, 100.0, 10.0, 1.0, 0.1, 0.01, 0.001];

/// Relative scale change per unit of scale input.
const SCALE_STEP: f64 = 0.015;

/// Seconds of transition per degree of pitch/roll removed.
const TRANSITION_SECS_PER_DEGREE: f64 = 0.03;
const MAX_TRANSITION_SECS: f64 = 5.0;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Static settings of one navigation.
#[derive(Debug, Clone)]
pub struct NavigationConfig {
    pub start_transform: DMat4,
    pub start_scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Cooldown after a snap.  Zero disables snapping.
    pub scale_stop_duration: Duration,
    pub trans_factor: f64,
    pub rot_factor: f64,
    pub invert: bool,
    pub start_mode: NavMode,
    pub reacts_on_portal_transit: bool,
    pub ground_following: Option<GroundFollowingSettings>,
    pub trace: Option<TraceSettings>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            start_transform: DMat4::IDENTITY,
            start_scale: 1.0,
            min_scale: 0.0001,
            max_scale: 10000.0,
            scale_stop_duration: Duration::from_secs(1),
            trans_factor: 0.1,
            rot_factor: 0.75,
            invert: false,
            start_mode: NavMode::Free6Dof,
            reacts_on_portal_transit: false,
            ground_following: None,
            trace: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

/// An active scale snap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleStop {
    pub snap_value: f64,
    pub started_at: Duration,
}

/// In-flight re-alignment to an upright orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub start: DQuat,
    pub target: DQuat,
    pub started_at: Duration,
    pub duration: Duration,
}

pub struct NavigationState {
    id: NavigationId,
    transform: DMat4,
    scale: f64,
    scale_stop: Option<ScaleStop>,
    mode: NavMode,
    transition: Option<Transition>,
    clock: Duration,
    reference: DMat4,
    blocked: bool,
    config: NavigationConfig,
    ground: Option<GroundFollowing>,
    trace: Option<MovementTrace>,
}

impl NavigationState {
    /// Create a navigation at its start transform and scale.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::Config`] when the scale bounds are not positive
    /// and ordered, or the start scale lies outside them.
    pub fn new(id: NavigationId, config: NavigationConfig) -> Result<Self, HyperError> {
        if !(config.min_scale > 0.0 && config.min_scale <= config.max_scale) {
            return Err(HyperError::config(format!(
                "{id}: invalid scale bounds [{}, {}]",
                config.min_scale, config.max_scale
            )));
        }
        if !(config.min_scale..=config.max_scale).contains(&config.start_scale) {
            return Err(HyperError::config(format!(
                "{id}: start scale {} outside [{}, {}]",
                config.start_scale, config.min_scale, config.max_scale
            )));
        }

        let transform = rigid_part(&config.start_transform);
        let ground = config.ground_following.clone().map(GroundFollowing::new);
        let mut trace = config.trace.clone().map(MovementTrace::new);
        if let Some(trace) = trace.as_mut() {
            trace.clear(translation_of(&transform));
        }

        let mut nav = Self {
            id,
            transform,
            scale: config.start_scale,
            scale_stop: None,
            mode: NavMode::Free6Dof,
            transition: None,
            clock: Duration::ZERO,
            reference: DMat4::IDENTITY,
            blocked: false,
            ground,
            trace,
            config,
        };
        if nav.config.start_mode == NavMode::GroundBased {
            nav.set_mode(NavMode::GroundBased);
        }
        Ok(nav)
    }

    pub fn id(&self) -> NavigationId {
        self.id
    }

    /// Rigid platform matrix.
    pub fn transform(&self) -> DMat4 {
        self.transform
    }

    pub fn translation(&self) -> DVec3 {
        translation_of(&self.transform)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// `transform * scale`, the matrix the scene attaches users to.
    pub fn world_transform(&self) -> DMat4 {
        self.transform * DMat4::from_scale(DVec3::splat(self.scale))
    }

    pub fn mode(&self) -> NavMode {
        self.mode
    }

    pub fn scale_stop(&self) -> Option<ScaleStop> {
        self.scale_stop
    }

    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    pub fn in_transition(&self) -> bool {
        self.transition.is_some()
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// Tracked device matrix relative to the platform.
    pub fn reference(&self) -> DMat4 {
        self.reference
    }

    pub fn reacts_on_portal_transit(&self) -> bool {
        self.config.reacts_on_portal_transit
    }

    pub fn trace(&self) -> Option<&MovementTrace> {
        self.trace.as_ref()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// While blocked, relative input is ignored.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn set_reference(&mut self, reference: DMat4) {
        self.reference = reference;
    }

    /// Overwrite the platform matrix; any scale in `transform` is dropped.
    pub fn set_transform(&mut self, transform: DMat4) {
        self.transform = rigid_part(&transform);
    }

    /// Set the scale directly, bypassing snapping, and end any scale stop.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale.clamp(self.config.min_scale, self.config.max_scale);
        self.scale_stop = None;
    }

    /// Drop the movement trace history and restart it at the current position.
    pub fn clear_trace(&mut self) {
        let position = translation_of(&self.world_transform());
        if let Some(trace) = self.trace.as_mut() {
            trace.clear(position);
        }
    }

    /// Back to the start transform and scale.
    pub fn reset(&mut self) {
        self.transform = rigid_part(&self.config.start_transform);
        self.scale = self.config.start_scale;
        self.scale_stop = None;
        self.clear_trace();
        info!(navigation = %self.id, "navigation reset");
    }

    // ────────────────────────────────────────────────────────────────────────
    // Input mapping
    // ────────────────────────────────────────────────────────────────────────

    /// Apply one frame of relative device input.
    pub fn apply_relative_input(&mut self, dof: &DofVector) {
        if self.blocked {
            return;
        }
        let mut v = dof.0;
        if self.config.invert {
            for channel in v.iter_mut().take(6) {
                *channel = -*channel;
            }
        }
        if self.mode == NavMode::GroundBased {
            v[1] = 0.0;
            v[3] = 0.0;
            v[5] = 0.0;
        }
        self.map_scale_input(v[6]);
        self.map_movement_input(v[0], v[1], v[2], v[3], v[4], v[5]);
    }

    /// Zoom by `input` steps of 1.5 %, stopping at [`SNAP_LEVELS`].
    ///
    /// While a scale stop is active and its duration has not elapsed the call
    /// changes nothing.
    pub fn map_scale_input(&mut self, input: f64) {
        if input == 0.0 {
            return;
        }
        let old_scale = self.scale;
        let mut new_scale = (old_scale * (1.0 + input * SCALE_STEP)).clamp(self.config.min_scale, self.config.max_scale);

        if self.config.scale_stop_duration.is_zero() {
            self.scale = new_scale;
            return;
        }

        if let Some(stop) = self.scale_stop {
            if self.clock.saturating_sub(stop.started_at) <= self.config.scale_stop_duration {
                return;
            }
            self.scale_stop = None;
        }

        let old_rounded = round_to(old_scale, 6);
        new_scale = round_to(new_scale, 6);

        let crossed = SNAP_LEVELS.iter().copied().find(|level| {
            (old_rounded < *level && new_scale > *level) || (new_scale < *level && old_rounded > *level)
        });
        if let Some(level) = crossed {
            new_scale = level;
            self.scale_stop = Some(ScaleStop {
                snap_value: level,
                started_at: self.clock,
            });
            debug!(navigation = %self.id, level, "scale snapped");
        }
        self.scale = new_scale;
    }

    /// Translate and rotate the platform.
    ///
    /// Translation is eased, scaled by `trans_factor * scale` and expressed in
    /// the platform orientation composed with the device orientation.
    /// Rotation is eased, scaled by `rot_factor` (degrees) and applied around
    /// the scaled device position.
    pub fn map_movement_input(&mut self, x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) {
        let trans_input = DVec3::new(x, y, z);
        let rot_input = DVec3::new(rx, ry, rz);
        if trans_input == DVec3::ZERO && rot_input == DVec3::ZERO {
            return;
        }

        let center = translation_of(&self.reference) * self.scale;

        let translation = if trans_input == DVec3::ZERO {
            DVec3::ZERO
        } else {
            let orientation = rotation_of(&self.transform) * rotation_of(&self.reference);
            orientation * (ease_cubic(trans_input) * self.config.trans_factor * self.scale)
        };
        let rotation = ease_cubic(rot_input) * self.config.rot_factor;

        self.transform = DMat4::from_translation(translation)
            * self.transform
            * DMat4::from_translation(center)
            * rotation_ypr_degrees(rotation.y, rotation.x, rotation.z)
            * DMat4::from_translation(-center);
    }

    // ────────────────────────────────────────────────────────────────────────
    // Modes
    // ────────────────────────────────────────────────────────────────────────

    pub fn set_mode(&mut self, mode: NavMode) {
        self.mode = mode;
        if mode == NavMode::GroundBased {
            self.start_ground_alignment_transition();
        }
        info!(navigation = %self.id, ?mode, "navigation mode set");
    }

    /// Switch between ground-based and 6-DOF mode.  Returns `false` (and does
    /// nothing) while a transition is in flight.
    pub fn toggle_mode(&mut self) -> bool {
        if self.transition.is_some() {
            return false;
        }
        self.set_mode(self.mode.toggled());
        true
    }

    fn start_ground_alignment_transition(&mut self) {
        let start = rotation_of(&self.transform);
        let target = yaw_only(start);
        let angle = start.angle_between(target).to_degrees();
        if angle < 1e-3 {
            return;
        }
        let secs = (angle * TRANSITION_SECS_PER_DEGREE).min(MAX_TRANSITION_SECS);
        self.transition = Some(Transition {
            start,
            target,
            started_at: self.clock,
            duration: Duration::from_secs_f64(secs),
        });
        debug!(navigation = %self.id, angle, secs, "ground alignment started");
    }

    fn advance_transition(&mut self) {
        let Some(transition) = self.transition else {
            return;
        };
        let translation = translation_of(&self.transform);
        let elapsed = self.clock.saturating_sub(transition.started_at);
        if elapsed < transition.duration {
            let factor = elapsed.as_secs_f64() / transition.duration.as_secs_f64();
            let rotation = transition.start.slerp(transition.target, factor);
            self.transform = DMat4::from_rotation_translation(rotation, translation);
        } else {
            self.transform = DMat4::from_rotation_translation(transition.target, translation);
            self.transition = None;
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Frame update
    // ────────────────────────────────────────────────────────────────────────

    /// Advance the clock by `dt`, then run the transition, ground following
    /// (ground-based mode only, not during a transition) and trace recording.
    pub fn tick(&mut self, dt: Duration, ground: Option<&dyn GroundPicker>) {
        self.clock += dt;
        self.advance_transition();

        if self.mode == NavMode::GroundBased
            && self.transition.is_none()
            && let (Some(follower), Some(picker)) = (self.ground.as_mut(), ground)
        {
            let platform = self.transform * DMat4::from_scale(DVec3::splat(self.scale));
            let adjustment = follower.step(picker, &platform, &self.reference, self.scale);
            let dy = adjustment.vertical_offset();
            if dy != 0.0 {
                self.transform = DMat4::from_translation(DVec3::new(0.0, dy, 0.0)) * self.transform;
            }
        }

        let position = translation_of(&self.world_transform());
        if let Some(trace) = self.trace.as_mut() {
            trace.record(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperspace_hal::sim::SimGround;
    use proptest::prelude::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn nav() -> NavigationState {
        NavigationState::new(NavigationId(0), NavigationConfig::default()).unwrap()
    }

    fn nav_at_scale(scale: f64) -> NavigationState {
        NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                start_scale: scale,
                ..NavigationConfig::default()
            },
        )
        .unwrap()
    }

    fn tilted() -> DMat4 {
        DMat4::from_rotation_translation(
            DQuat::from_rotation_y(0.4) * DQuat::from_rotation_x(0.5),
            DVec3::new(1.0, 2.0, 3.0),
        )
    }

    #[test]
    fn rejects_bad_scale_bounds() {
        let cfg = NavigationConfig {
            min_scale: 0.0,
            ..NavigationConfig::default()
        };
        assert!(NavigationState::new(NavigationId(1), cfg).is_err());
        let cfg = NavigationConfig {
            start_scale: 20000.0,
            ..NavigationConfig::default()
        };
        assert!(NavigationState::new(NavigationId(1), cfg).is_err());
    }

    #[test]
    fn scale_grows_by_step() {
        let mut n = nav_at_scale(2.0);
        n.map_scale_input(1.0);
        assert!((n.scale() - 2.03).abs() < 1e-9);
        n.map_scale_input(0.0);
        assert!((n.scale() - 2.03).abs() < 1e-9);
    }

    #[test]
    fn crossing_a_level_snaps_and_starts_stop() {
        let mut n = nav_at_scale(0.995);
        n.map_scale_input(1.0);
        assert_eq!(n.scale(), 1.0);
        let stop = n.scale_stop().unwrap();
        assert_eq!(stop.snap_value, 1.0);
    }

    #[test]
    fn large_step_snaps_to_largest_crossed_level() {
        let mut n = nav_at_scale(9.0);
        n.map_scale_input(10000.0);
        assert_eq!(n.scale(), 1000.0);
    }

    #[test]
    fn cooldown_suppresses_all_changes() {
        let mut n = nav_at_scale(0.995);
        n.map_scale_input(1.0);
        for _ in 0..30 {
            n.tick(FRAME, None);
            n.map_scale_input(50.0);
            assert_eq!(n.scale(), 1.0);
        }
        assert!(n.scale_stop().is_some());
    }

    #[test]
    fn scaling_resumes_after_cooldown() {
        let mut n = nav_at_scale(0.995);
        n.map_scale_input(1.0);
        n.tick(Duration::from_millis(1100), None);
        n.map_scale_input(1.0);
        assert!(n.scale_stop().is_none());
        assert!((n.scale() - 1.015).abs() < 1e-9);
    }

    #[test]
    fn leaving_a_snapped_level_does_not_resnap() {
        let mut n = nav_at_scale(1.0);
        n.map_scale_input(-1.0);
        assert!((n.scale() - 0.985).abs() < 1e-9);
        assert!(n.scale_stop().is_none());
    }

    #[test]
    fn zero_stop_duration_disables_snapping() {
        let mut n = NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                start_scale: 0.995,
                scale_stop_duration: Duration::ZERO,
                ..NavigationConfig::default()
            },
        )
        .unwrap();
        n.map_scale_input(1.0);
        assert!((n.scale() - 0.995 * 1.015).abs() < 1e-12);
        assert!(n.scale_stop().is_none());
    }

    #[test]
    fn scale_clamped_to_bounds() {
        let mut n = nav_at_scale(9999.0);
        n.map_scale_input(100.0);
        assert_eq!(n.scale(), 10000.0);
    }

    #[test]
    fn translation_is_eased_and_scaled() {
        let mut n = nav_at_scale(2.0);
        n.map_movement_input(0.0, 0.0, -0.5, 0.0, 0.0, 0.0);
        // 0.5^3 * 0.1 * 2.0
        assert!((n.translation() - DVec3::new(0.0, 0.0, -0.025)).length() < 1e-12);
    }

    #[test]
    fn translation_follows_platform_and_device_orientation() {
        let mut n = nav();
        n.set_transform(DMat4::from_rotation_y(90f64.to_radians()));
        n.map_movement_input(0.0, 0.0, -1.0, 0.0, 0.0, 0.0);
        assert!((n.translation() - DVec3::new(-0.1, 0.0, 0.0)).length() < 1e-9);

        let mut n = nav();
        n.set_reference(DMat4::from_rotation_y(-90f64.to_radians()));
        n.map_movement_input(0.0, 0.0, -1.0, 0.0, 0.0, 0.0);
        assert!((n.translation() - DVec3::new(0.1, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn rotation_pivots_around_reference_point() {
        let mut n = nav();
        let hand = DVec3::new(0.0, 1.2, 0.6);
        n.set_reference(DMat4::from_translation(hand));
        for _ in 0..10 {
            n.map_movement_input(0.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        }
        // The device position stays fixed in world space.
        let world_hand = n.world_transform().transform_point3(hand);
        assert!((world_hand - hand).length() < 1e-9);
        let yaw = crate::math::yaw_of(rotation_of(&n.transform()));
        assert!((yaw.to_degrees() - 7.5).abs() < 1e-9);
    }

    #[test]
    fn invert_negates_movement() {
        let mut n = NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                invert: true,
                ..NavigationConfig::default()
            },
        )
        .unwrap();
        n.apply_relative_input(&DofVector::from_parts([1.0, 0.0, 0.0], [0.0; 3], 0.0));
        assert!(n.translation().x < 0.0);
    }

    #[test]
    fn ground_mode_ignores_height_pitch_roll() {
        let mut n = nav();
        n.set_mode(NavMode::GroundBased);
        n.apply_relative_input(&DofVector::from_parts([0.0, 1.0, 0.0], [1.0, 0.0, 1.0], 0.0));
        assert_eq!(n.transform(), DMat4::IDENTITY);
    }

    #[test]
    fn blocked_navigation_ignores_input() {
        let mut n = nav();
        n.set_blocked(true);
        n.apply_relative_input(&DofVector::from_parts([1.0, 1.0, 1.0], [1.0, 1.0, 1.0], 1.0));
        assert_eq!(n.transform(), DMat4::IDENTITY);
        assert_eq!(n.scale(), 1.0);
    }

    #[test]
    fn ground_transition_duration_and_result() {
        let mut n = nav();
        n.set_transform(tilted());
        n.set_mode(NavMode::GroundBased);
        let t = *n.transition().unwrap();
        // 0.5 rad of pitch removed.
        let expected = 0.5f64.to_degrees() * 0.03;
        assert!((t.duration.as_secs_f64() - expected).abs() < 1e-6);
        assert!(!n.toggle_mode(), "toggle is blocked during a transition");

        n.tick(t.duration / 2, None);
        assert!(n.in_transition());
        assert!((n.translation() - DVec3::new(1.0, 2.0, 3.0)).length() < 1e-9);

        n.tick(t.duration, None);
        assert!(!n.in_transition());
        let up = rotation_of(&n.transform()) * DVec3::Y;
        assert!((up - DVec3::Y).length() < 1e-9);
        assert!((crate::math::yaw_of(rotation_of(&n.transform())) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn upright_platform_needs_no_transition() {
        let mut n = nav();
        n.set_transform(DMat4::from_rotation_y(1.0));
        n.set_mode(NavMode::GroundBased);
        assert!(!n.in_transition());
        assert!(n.toggle_mode());
        assert_eq!(n.mode(), NavMode::Free6Dof);
    }

    #[test]
    fn transition_capped_at_five_seconds() {
        let mut n = nav();
        n.set_transform(DMat4::from_rotation_x(3.0));
        n.set_mode(NavMode::GroundBased);
        assert_eq!(n.transition().unwrap().duration, Duration::from_secs(5));
    }

    #[test]
    fn reset_restores_start() {
        let start = DMat4::from_translation(DVec3::new(0.0, 0.0, 15.0));
        let mut n = NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                start_transform: start,
                start_scale: 2.0,
                trace: Some(TraceSettings::default()),
                ..NavigationConfig::default()
            },
        )
        .unwrap();
        for _ in 0..50 {
            n.map_movement_input(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
            n.tick(FRAME, None);
        }
        n.map_scale_input(3.0);
        assert!(n.trace().unwrap().len() > 1);
        n.reset();
        assert!((n.translation() - DVec3::new(0.0, 0.0, 15.0)).length() < 1e-12);
        assert_eq!(n.scale(), 2.0);
        assert_eq!(n.trace().unwrap().len(), 1);
    }

    #[test]
    fn ground_following_runs_only_in_ground_mode() {
        let ground = SimGround::flat(-0.5);
        let mut n = NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                ground_following: Some(GroundFollowingSettings {
                    ray_start_height: 1.0,
                    ..GroundFollowingSettings::default()
                }),
                ..NavigationConfig::default()
            },
        )
        .unwrap();
        n.tick(FRAME, Some(&ground));
        assert_eq!(n.translation().y, 0.0);

        n.set_mode(NavMode::GroundBased);
        n.tick(FRAME, Some(&ground));
        assert!((n.translation().y - (-0.075)).abs() < 1e-9);
    }

    #[test]
    fn ground_following_steady_state() {
        let ground = SimGround::flat(0.0);
        let mut n = NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                start_mode: NavMode::GroundBased,
                start_scale: 1.0,
                ground_following: Some(GroundFollowingSettings {
                    ray_start_height: 1.0,
                    ..GroundFollowingSettings::default()
                }),
                ..NavigationConfig::default()
            },
        )
        .unwrap();
        let before = n.transform();
        n.tick(FRAME, Some(&ground));
        assert_eq!(n.transform(), before);
    }

    #[test]
    fn set_scale_clears_stop() {
        let mut n = nav_at_scale(0.995);
        n.map_scale_input(1.0);
        assert!(n.scale_stop().is_some());
        n.set_scale(3.0);
        assert!(n.scale_stop().is_none());
        assert_eq!(n.scale(), 3.0);
    }

    proptest! {
        #[test]
        fn scale_without_crossing_follows_formula(start in 1.5f64..9.0, input in -1.0f64..1.0) {
            let mut n = nav_at_scale(start);
            let expected = start * (1.0 + input * 0.015);
            prop_assume!(expected > 1.0 && expected < 10.0);
            n.map_scale_input(input);
            prop_assert!((n.scale() - expected).abs() <= 5e-7);
            prop_assert!(n.scale_stop().is_none());
        }

        #[test]
        fn crossing_always_lands_on_level(level_idx in 0usize..7, below in prop::bool::ANY, step in 0.2f64..0.5) {
            let level = SNAP_LEVELS[level_idx];
            let start = if below { level * (1.0 - step * 0.01) } else { level * (1.0 + step * 0.01) };
            let input = if below { 40.0 } else { -40.0 };
            let mut n = nav_at_scale(start);
            n.map_scale_input(input);
            let snapped = n.scale_stop().map(|s| s.snap_value);
            prop_assert!(snapped.is_some());
            prop_assert_eq!(Some(n.scale()), snapped);
        }
    }
}
