//! `hyperspace-hal` – collaborator seams of the VR core.
//!
//! Everything the navigation and slot layers consume from the outside world
//! is reached through a narrow trait defined here.
//!
//! # Modules
//!
//! - [`device`] – [`DeviceSensor`][device::DeviceSensor]: per-station analog
//!   values and buttons of an input device.
//! - [`tracking`] – [`TrackingService`][tracking::TrackingService] and the
//!   [`TrackingTarget`][tracking::TrackingTarget] reader that falls back to a
//!   configured default matrix.
//! - [`ground`] – [`GroundPicker`][ground::GroundPicker]: downward ray queries
//!   used by ground following.
//! - [`shutter`] – [`ShutterController`][shutter::ShutterController]: the
//!   shutter-glasses radio master.
//! - [`status`] – helpers that turn driver status strings into
//!   [`HyperError`][hyperspace_types::HyperError]s.
//! - [`sim`] – in-process simulated drivers for tests and headless runs.

pub mod device;
pub mod ground;
pub mod shutter;
pub mod sim;
pub mod status;
pub mod tracking;

pub use device::DeviceSensor;
pub use ground::{GroundPicker, Hit};
pub use shutter::{MasterConfig, ShutterController};
pub use tracking::{TrackingService, TrackingTarget};
