//! Ground following.
//!
//! Each frame a ray is cast straight down from `ray_start_height` above the
//! tracked reference point (in the scaled navigation frame).  The hit distance
//! is compared against the expected height `ray_start_height * scale`:
//!
//! | Difference | Reaction |
//! |---|---|
//! | `< 0` (ground rose) | climb by `-difference * height_modification_factor` |
//! | `0 < d <= expected` | descend by the same formula |
//! | `> expected` | fall with a velocity growing each frame up to a cap |
//! | no hit | stay in place, falling stops |

use glam::{DMat4, DVec3};
use hyperspace_hal::ground::GROUND_PICK_MASK;
use hyperspace_hal::GroundPicker;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::math::{round_to, translation_of};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundFollowingSettings {
    /// Height of the ray origin above the navigation frame, unscaled.
    #[serde(default = "default_ray_start_height")]
    pub ray_start_height: f64,
    /// Maximum ray length in world units.
    #[serde(default = "default_pick_length")]
    pub pick_length: f64,
    #[serde(default = "default_height_modification_factor")]
    pub height_modification_factor: f64,
    /// Added to the fall velocity every frame.
    #[serde(default = "default_fall_increment")]
    pub fall_increment: f64,
    /// Maximum fall distance per frame.
    #[serde(default = "default_terminal_velocity")]
    pub terminal_velocity: f64,
}

fn default_ray_start_height() -> f64 {
    0.75
}
fn default_pick_length() -> f64 {
    100.0
}
fn default_height_modification_factor() -> f64 {
    0.15
}
fn default_fall_increment() -> f64 {
    0.003
}
fn default_terminal_velocity() -> f64 {
    0.2
}

impl Default for GroundFollowingSettings {
    fn default() -> Self {
        Self {
            ray_start_height: default_ray_start_height(),
            pick_length: default_pick_length(),
            height_modification_factor: default_height_modification_factor(),
            fall_increment: default_fall_increment(),
            terminal_velocity: default_terminal_velocity(),
        }
    }
}

/// Outcome of one ground following step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroundAdjustment {
    Climb(f64),
    Descend(f64),
    Fall(f64),
    Steady,
    NoGround,
}

impl GroundAdjustment {
    /// World-space Y translation to apply.
    pub fn vertical_offset(self) -> f64 {
        match self {
            GroundAdjustment::Climb(dy) | GroundAdjustment::Descend(dy) | GroundAdjustment::Fall(dy) => dy,
            GroundAdjustment::Steady | GroundAdjustment::NoGround => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroundFollowing {
    settings: GroundFollowingSettings,
    falling: bool,
    fall_velocity: f64,
}

impl GroundFollowing {
    pub fn new(settings: GroundFollowingSettings) -> Self {
        Self {
            settings,
            falling: false,
            fall_velocity: 0.0,
        }
    }

    pub fn settings(&self) -> &GroundFollowingSettings {
        &self.settings
    }

    pub fn is_falling(&self) -> bool {
        self.falling
    }

    /// World position the ray starts from.
    ///
    /// `platform` is the scaled navigation matrix, `reference` the tracked
    /// device matrix relative to it.
    pub fn ray_origin(&self, platform: &DMat4, reference: &DMat4) -> DVec3 {
        let mut start = translation_of(reference);
        start.y = self.settings.ray_start_height;
        platform.transform_point3(start)
    }

    /// Cast the ray and work out the vertical correction for this frame.
    pub fn step(
        &mut self,
        picker: &dyn GroundPicker,
        platform: &DMat4,
        reference: &DMat4,
        scale: f64,
    ) -> GroundAdjustment {
        let origin = self.ray_origin(platform, reference);
        let hits = picker.raycast(origin, DVec3::NEG_Y, self.settings.pick_length, GROUND_PICK_MASK);
        let Some(hit) = hits.first() else {
            self.land();
            return GroundAdjustment::NoGround;
        };

        let expected = self.settings.ray_start_height * scale;
        let difference = round_to(hit.distance - expected, 3);
        let factor = self.settings.height_modification_factor;

        let adjustment = if difference < 0.0 {
            self.land();
            GroundAdjustment::Climb(-difference * factor)
        } else if difference > expected {
            self.falling = true;
            self.fall_velocity = (self.fall_velocity + self.settings.fall_increment).min(self.settings.terminal_velocity);
            GroundAdjustment::Fall(-self.fall_velocity)
        } else if difference > 0.0 {
            self.land();
            GroundAdjustment::Descend(-difference * factor)
        } else {
            GroundAdjustment::Steady
        };
        trace!(object = %hit.object, difference, ?adjustment, "ground following");
        adjustment
    }

    fn land(&mut self) {
        self.falling = false;
        self.fall_velocity = 0.0;
    }
}
