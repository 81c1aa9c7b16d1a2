//! `hyperspace-navigation` – steering, ground following and portal transit.
//!
//! Turns raw input device samples into navigation transforms and moves those
//! transforms through portals.
//!
//! # Modules
//!
//! - [`input`] – [`DeviceInput`][input::DeviceInput]: data-driven channel
//!   bindings that normalise device sensors into a
//!   [`DofVector`][hyperspace_types::DofVector], with presets for every
//!   supported [`DeviceProfile`][input::DeviceProfile].
//! - [`steering`] – [`NavigationState`][steering::NavigationState]: the
//!   accumulated platform transform with scale snapping, mode transitions and
//!   the per-frame [`tick`][steering::NavigationState::tick].
//! - [`ground`] – [`GroundFollowing`][ground::GroundFollowing]: keeps a
//!   ground-based navigation on top of the pickable geometry.
//! - [`trace`] – [`MovementTrace`][trace::MovementTrace]: bounded history of
//!   world positions.
//! - [`portal`] – [`Portal`][portal::Portal] and the
//!   [`PortalTransitDetector`][portal::PortalTransitDetector] that teleports
//!   navigations stepping through a portal.
//! - [`math`] – small matrix helpers shared by the modules above.

pub mod ground;
pub mod input;
pub mod math;
pub mod portal;
pub mod steering;
pub mod trace;

pub use ground::{GroundAdjustment, GroundFollowing, GroundFollowingSettings};
pub use input::{DeviceInput, DeviceProfile, InputSample};
pub use portal::{Portal, PortalTransitDetector, ViewingMode};
pub use steering::{NavigationConfig, NavigationState};
pub use trace::{MovementTrace, TraceSettings};
