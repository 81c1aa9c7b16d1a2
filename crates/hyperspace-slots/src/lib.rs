//! `hyperspace-slots` – shutter-glasses slot management.
//!
//! Shares the time-multiplexed images of each physical display among the
//! users standing in front of it and programs the shutter glasses to match.
//!
//! # Modules
//!
//! - [`display`] – [`PhysicalDisplay`][display::PhysicalDisplay]: slots and
//!   shutter timing table of one display, built from a
//!   [`DisplayConfig`][display::DisplayConfig].
//! - [`user`] – [`UserRegistry`][user::UserRegistry]: users with VIP and
//!   activity state, glasses and current display.
//! - [`scheduler`] – [`SlotAssignmentScheduler`][scheduler::SlotAssignmentScheduler]:
//!   splits each display's slots among its users.
//! - [`uploader`] – [`ShutterTimingUploader`][uploader::ShutterTimingUploader]:
//!   turns slot runs into radio master commands, deferring opening runs.
//! - [`deferred`] – [`DeferredQueue`][deferred::DeferredQueue]: frame-delayed
//!   command batches.

pub mod deferred;
pub mod display;
pub mod scheduler;
pub mod uploader;
pub mod user;

pub use deferred::DeferredQueue;
pub use display::{DisplayConfig, PhysicalDisplay, Slot, SlotTiming, SlotTimingConfig};
pub use scheduler::{DisplayAssignment, SlotAssignmentScheduler, SlotRun};
pub use uploader::{ShutterCommand, ShutterTimingUploader, UploadReport, UploaderSettings};
pub use user::{ActivityZone, User, UserDescriptor, UserRegistry};
