//! Ground-pick ray queries.

use glam::DVec3;

/// Scene-graph pick mask of geometry that ground following walks on.
pub const GROUND_PICK_MASK: &str = "gf_pick_group";

/// One ray intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Distance from the ray origin in world units.
    pub distance: f64,
    /// Name of the intersected object.
    pub object: String,
}

/// Ray caster against the scene's pickable geometry.
pub trait GroundPicker {
    /// Intersections of the ray with objects matching `mask`, nearest first.
    /// An empty list means no surface was found within `max_length`.
    fn raycast(&self, origin: DVec3, direction: DVec3, max_length: f64, mask: &str) -> Vec<Hit>;
}
