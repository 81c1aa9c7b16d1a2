//! Shutter-glasses radio master.
//!
//! The radio master keeps one event table per pair of glasses.  Each event
//! is a `(time, value)` pair: at `time` microseconds after the sync signal the
//! glasses switch to the shutter state encoded by `value`.  Tables are edited
//! locally with the `set_*` calls and transferred with
//! [`ShutterController::send_shutter_config`].

use std::path::Path;

use hyperspace_types::{GlassesId, HyperError};

/// Sync settings of the radio master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    /// Transmit the sync signal to the glasses.
    pub transmit: bool,
    /// `true` = use the external sync signal, `false` = internal clock.
    pub external_clock: bool,
    /// Frame period in microseconds.
    pub period_us: u32,
    /// Sync offset in microseconds.
    pub offset_us: u32,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            transmit: true,
            external_clock: true,
            period_us: 16600,
            offset_us: 16500,
        }
    }
}

/// Driver for the shutter radio master.
///
/// Every call may fail with [`HyperError::HardwareFault`]; callers log the
/// fault and keep running.
pub trait ShutterController: Send {
    /// Stable identifier of the controller, e.g. `"radio-master"`.
    fn id(&self) -> &str;

    /// Open the HID connection.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the device cannot be opened.
    fn open(&mut self) -> Result<(), HyperError>;

    /// Replace the local tables with the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the file cannot be loaded.
    fn load_config(&mut self, path: &Path) -> Result<(), HyperError>;

    /// Transfer the local tables to the glasses.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the transfer fails.
    fn send_shutter_config(&mut self) -> Result<(), HyperError>;

    /// Set the time of event `event` for `glasses`.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the driver rejects the value.
    fn set_timer_value(&mut self, glasses: GlassesId, event: usize, time_us: u32) -> Result<(), HyperError>;

    /// Set the shutter state of event `event` for `glasses`.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the driver rejects the value.
    fn set_shutter_value(&mut self, glasses: GlassesId, event: usize, value: u8) -> Result<(), HyperError>;

    /// Override the event table of `glasses` with a constant shutter state.
    /// `enabled = false` removes the override.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the driver rejects the value.
    fn set_shutter_const(&mut self, glasses: GlassesId, value: u8, enabled: bool) -> Result<(), HyperError>;

    /// Apply and transfer the sync settings.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the transfer fails.
    fn send_master_config(&mut self, master: &MasterConfig) -> Result<(), HyperError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_config_defaults() {
        let m = MasterConfig::default();
        assert!(m.transmit);
        assert!(m.external_clock);
        assert_eq!(m.period_us, 16600);
        assert_eq!(m.offset_us, 16500);
    }
}
