//! `hyperspace-runtime` – the per-frame driver.
//!
//! # Modules
//!
//! - [`frame_loop`] – [`FrameScheduler`][frame_loop::FrameScheduler]: runs
//!   input, navigation, portals, user activity and shutter upload in a fixed
//!   order every frame.
//! - [`setup`] – [`SetupConfig`][setup::SetupConfig]: declarative scene
//!   description and the [`Hardware`][setup::Hardware] it is built on.
//! - [`telemetry`] – subscriber and optional OTLP export.

pub mod frame_loop;
pub mod setup;
pub mod telemetry;

pub use frame_loop::{FrameReport, FrameScheduler, FrameSchedulerBuilder, NavigationRig};
pub use setup::{Hardware, NavigationSetup, Placement, PortalSetup, SetupConfig, UserSetup};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
