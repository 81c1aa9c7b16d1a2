//! Device input normalisation.
//!
//! A [`DeviceInput`] owns the daemon stations of one input device and a
//! table of [`ChannelBinding`]s.  Each frame [`DeviceInput::sample`] zeroes
//! the seven channels, evaluates every binding against the current sensor
//! state and accumulates the results:
//!
//! - [`ChannelFilter::Filtered`] bindings run the raw value through
//!   [`filter_channel`] (offset, dead zone, normalisation to `[-1, 1]`).
//! - [`ChannelFilter::Raw`] bindings add the value unchanged; buttons read as
//!   `0.0` / `1.0`.
//! - Trigger targets (reset, mode toggle, coupling) only report rising edges.
//!
//! A binding that cannot be evaluated is logged and contributes `0` for the
//! frame; the remaining bindings still run.
//!
//! # Example
//!
//! ```rust
//! use hyperspace_hal::sim::SimDeviceSensor;
//! use hyperspace_navigation::input::{DeviceInput, DeviceProfile};
//!
//! let sensor = SimDeviceSensor::new("device-spacemouse", 6, 2);
//! let mut input = DeviceInput::from_profile(DeviceProfile::Spacemouse, vec![Box::new(sensor.clone())]).unwrap();
//!
//! sensor.set_button(0, true);
//! let sample = input.sample();
//! assert_eq!(sample.dof.scale(), 1.0);
//! ```

use hyperspace_hal::DeviceSensor;
use hyperspace_types::{DOF_CHANNELS, DofVector, HyperError};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ────────────────────────────────────────────────────────────────────────────
// Filtering
// ────────────────────────────────────────────────────────────────────────────

/// Calibration of one analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Rest value of the sensor.
    pub offset: f64,
    /// Raw value at full negative deflection.
    pub min: f64,
    /// Raw value at full positive deflection.
    pub max: f64,
    /// Negative dead zone in percent of `min`.
    pub neg_threshold_pct: f64,
    /// Positive dead zone in percent of `max`.
    pub pos_threshold_pct: f64,
}

impl FilterParams {
    pub const fn new(offset: f64, min: f64, max: f64, neg_threshold_pct: f64, pos_threshold_pct: f64) -> Self {
        Self {
            offset,
            min,
            max,
            neg_threshold_pct,
            pos_threshold_pct,
        }
    }
}

/// Map `raw` into `[-1, 1]` with a dead zone around the rest value.
pub fn filter_channel(raw: f64, p: &FilterParams) -> f64 {
    let value = raw - p.offset;
    let min = p.min - p.offset;
    let max = p.max - p.offset;

    if value > 0.0 {
        let pos_cut = max * p.pos_threshold_pct * 0.01;
        if value > pos_cut {
            ((value - pos_cut) / (max - pos_cut)).min(1.0)
        } else {
            0.0
        }
    } else if value < 0.0 {
        let neg_cut = min * p.neg_threshold_pct * 0.01;
        if value < neg_cut {
            ((value - neg_cut) / (min - neg_cut).abs()).max(-1.0)
        } else {
            0.0
        }
    } else {
        0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Binding table
// ────────────────────────────────────────────────────────────────────────────

/// How a binding's value is post-processed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelFilter {
    Raw,
    Filtered(FilterParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Value,
    Button,
}

/// Where a binding reads from: `sensors[sensor]`, analog value or button
/// number `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    pub sensor: usize,
    pub kind: SourceKind,
    pub index: usize,
}

impl InputSource {
    pub const fn value(sensor: usize, index: usize) -> Self {
        Self {
            sensor,
            kind: SourceKind::Value,
            index,
        }
    }

    pub const fn button(sensor: usize, index: usize) -> Self {
        Self {
            sensor,
            kind: SourceKind::Button,
            index,
        }
    }
}

/// What a binding writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingTarget {
    /// Accumulate into channel `0..7` of the sample.
    Dof(usize),
    Reset,
    ModeToggle,
    Coupling,
}

/// One row of a device's binding table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub target: BindingTarget,
    pub source: InputSource,
    /// Multiplied into the raw value before filtering.
    #[serde(default = "default_gain")]
    pub gain: f64,
    pub filter: ChannelFilter,
}

fn default_gain() -> f64 {
    1.0
}

impl ChannelBinding {
    /// Filtered analog binding.
    pub const fn filtered(dof: usize, source: InputSource, gain: f64, params: FilterParams) -> Self {
        Self {
            target: BindingTarget::Dof(dof),
            source,
            gain,
            filter: ChannelFilter::Filtered(params),
        }
    }

    /// Unfiltered binding into a channel.
    pub const fn raw(dof: usize, source: InputSource, gain: f64) -> Self {
        Self {
            target: BindingTarget::Dof(dof),
            source,
            gain,
            filter: ChannelFilter::Raw,
        }
    }

    /// Button driving a discrete trigger.
    pub const fn trigger(target: BindingTarget, source: InputSource) -> Self {
        Self {
            target,
            source,
            gain: 1.0,
            filter: ChannelFilter::Raw,
        }
    }

    fn label(&self) -> String {
        format!("{:?} <- {:?}", self.target, self.source)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Device profiles
// ────────────────────────────────────────────────────────────────────────────

/// Built-in input device presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceProfile {
    Spacemouse,
    Globefish,
    /// Sensor 0 = keyboard, sensor 1 = mouse.
    KeyboardMouse,
    XBoxController,
    /// Sensor 0 = axes, sensor 1 = buttons.
    OldSpheron,
    NewSpheron,
}

impl DeviceProfile {
    /// Translation factor handed to the navigation.
    pub fn trans_factor(self) -> f64 {
        match self {
            DeviceProfile::Spacemouse => 0.1,
            DeviceProfile::Globefish => 0.2,
            DeviceProfile::KeyboardMouse => 0.08,
            DeviceProfile::XBoxController => 0.1,
            DeviceProfile::OldSpheron => 0.5,
            DeviceProfile::NewSpheron => 0.25,
        }
    }

    /// Rotation factor (degrees per frame at full deflection).
    pub fn rot_factor(self) -> f64 {
        match self {
            DeviceProfile::Spacemouse => 0.75,
            DeviceProfile::Globefish => 10.0,
            DeviceProfile::KeyboardMouse => 8.0,
            DeviceProfile::XBoxController => 1.2,
            DeviceProfile::OldSpheron => 0.0,
            DeviceProfile::NewSpheron => 25.0,
        }
    }

    /// Number of daemon stations the bindings read from.
    pub fn sensor_count(self) -> usize {
        match self {
            DeviceProfile::KeyboardMouse | DeviceProfile::OldSpheron => 2,
            _ => 1,
        }
    }

    /// Default daemon station names for a device called `device_name`.
    pub fn default_stations(self, device_name: &str) -> Vec<String> {
        match self {
            DeviceProfile::KeyboardMouse => vec!["device-keyboard0".to_string(), "device-mouse".to_string()],
            DeviceProfile::OldSpheron => {
                vec![device_name.to_string(), "device-old-spheron-buttons".to_string()]
            }
            _ => vec![device_name.to_string()],
        }
    }

    pub fn bindings(self) -> Vec<ChannelBinding> {
        use BindingTarget::{Coupling, ModeToggle, Reset};
        use ChannelBinding as B;
        use FilterParams as F;
        use InputSource as S;

        match self {
            DeviceProfile::Spacemouse => vec![
                B::filtered(0, S::value(0, 0), 1.0, F::new(0.0, -0.76, 0.82, 3.0, 3.0)),
                B::filtered(1, S::value(0, 1), -1.0, F::new(0.0, -0.7, 0.6, 3.0, 3.0)),
                B::filtered(2, S::value(0, 2), 1.0, F::new(0.0, -0.95, 0.8, 3.0, 3.0)),
                B::filtered(3, S::value(0, 3), 1.0, F::new(0.0, -0.82, 0.8, 12.0, 12.0)),
                B::filtered(4, S::value(0, 4), -1.0, F::new(0.0, -0.5, 0.6, 12.0, 12.0)),
                B::filtered(5, S::value(0, 5), 1.0, F::new(0.0, -0.86, 0.77, 12.0, 12.0)),
                B::raw(6, S::button(0, 0), 1.0),
                B::raw(6, S::button(0, 1), -1.0),
            ],
            DeviceProfile::Globefish => vec![
                B::filtered(0, S::value(0, 0), 1.0, F::new(0.0, -0.6, 0.85, 0.0, 0.0)),
                B::filtered(1, S::value(0, 1), -1.0, F::new(0.0, -0.25, 0.25, 0.0, 0.0)),
                B::filtered(2, S::value(0, 2), -1.0, F::new(0.0, -0.15, 0.15, 0.0, 0.0)),
                B::filtered(3, S::value(0, 3), -1.0, F::new(0.0, -512.0, 512.0, 0.0, 0.0)),
                B::filtered(4, S::value(0, 4), -1.0, F::new(0.0, -512.0, 512.0, 0.0, 0.0)),
                B::filtered(5, S::value(0, 5), 1.0, F::new(0.0, -512.0, 512.0, 0.0, 0.0)),
            ],
            DeviceProfile::KeyboardMouse => vec![
                // A / D
                B::raw(0, S::button(0, 1), -1.0),
                B::raw(0, S::button(0, 3), 1.0),
                // up / down
                B::raw(1, S::button(0, 7), 1.0),
                B::raw(1, S::button(0, 8), -1.0),
                // W / S
                B::raw(2, S::button(0, 0), -1.0),
                B::raw(2, S::button(0, 2), 1.0),
                // R, C, G
                B::trigger(Reset, S::button(0, 4)),
                B::trigger(Coupling, S::button(0, 5)),
                B::trigger(ModeToggle, S::button(0, 6)),
                B::filtered(3, S::value(1, 1), -1.0, F::new(0.0, -100.0, 100.0, 0.0, 0.0)),
                B::filtered(4, S::value(1, 0), -1.0, F::new(0.0, -100.0, 100.0, 0.0, 0.0)),
                B::raw(6, S::button(1, 0), -1.0),
                B::raw(6, S::button(1, 2), 1.0),
            ],
            DeviceProfile::XBoxController => vec![
                B::filtered(0, S::value(0, 0), 1.0, F::new(0.0, -1.0, 1.0, 15.0, 15.0)),
                B::filtered(2, S::value(0, 1), 1.0, F::new(0.0, -1.0, 1.0, 15.0, 15.0)),
                B::filtered(3, S::value(0, 3), 1.0, F::new(0.0, -1.0, 1.0, 15.0, 15.0)),
                B::filtered(4, S::value(0, 2), -1.0, F::new(0.0, -1.0, 1.0, 15.0, 15.0)),
                B::trigger(Reset, S::button(0, 0)),
                B::trigger(Coupling, S::button(0, 1)),
                B::trigger(ModeToggle, S::button(0, 2)),
                // TL / TR
                B::raw(6, S::button(0, 6), -1.0),
                B::raw(6, S::button(0, 7), 1.0),
            ],
            DeviceProfile::OldSpheron => {
                const REST: f64 = -0.00787377543747;
                vec![
                    B::filtered(0, S::value(0, 0), 1.0, F::new(REST, -0.0134, 0.003, 5.0, 5.0)),
                    B::filtered(1, S::value(0, 1), -1.0, F::new(REST, -0.0115, -0.003, 20.0, 20.0)),
                    B::filtered(2, S::value(0, 2), 1.0, F::new(REST, -0.015, 0.0, 5.0, 5.0)),
                    B::filtered(3, S::value(0, 3), 1.0, F::new(REST, -0.0095, -0.006, 0.0, 0.0)),
                    B::filtered(
                        4,
                        S::value(0, 4),
                        -1.0,
                        F::new(-REST, 0.00622577592731, 0.00912503432482, 0.0, 0.0),
                    ),
                    B::filtered(5, S::value(0, 5), 1.0, F::new(REST, -0.0095, -0.006, 0.0, 0.0)),
                    B::trigger(Reset, S::button(1, 1)),
                    B::raw(6, S::button(1, 0), -1.0),
                    B::raw(6, S::button(1, 2), 1.0),
                ]
            }
            DeviceProfile::NewSpheron => vec![
                B::filtered(0, S::value(0, 0), -1.0, F::new(0.0, -0.98, 1.0, 0.0, 0.0)),
                B::filtered(1, S::value(0, 1), 1.0, F::new(0.0, -0.44, 0.24, 0.0, 0.0)),
                B::filtered(2, S::value(0, 2), 1.0, F::new(0.0, -1.0, 0.94, 0.0, 0.0)),
                B::filtered(3, S::value(0, 3), -1.0, F::new(0.0, -2048.0, 2048.0, 0.0, 0.0)),
                B::filtered(4, S::value(0, 4), -1.0, F::new(0.0, -2048.0, 2048.0, 0.0, 0.0)),
                B::filtered(4, S::value(0, 6), 100.0, F::new(0.0, -0.6, 0.37, 0.0, 0.0)),
                B::filtered(5, S::value(0, 5), 1.0, F::new(0.0, -2048.0, 2048.0, 0.0, 0.0)),
                B::trigger(Reset, S::button(0, 1)),
                B::raw(6, S::button(0, 0), -1.0),
                B::raw(6, S::button(0, 2), 1.0),
            ],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Public API
// ────────────────────────────────────────────────────────────────────────────

/// One frame of device input.  Trigger flags are rising edges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSample {
    pub dof: DofVector,
    pub reset: bool,
    pub mode_toggle: bool,
    pub coupling: bool,
}

/// An input device: sensors plus binding table.
pub struct DeviceInput {
    sensors: Vec<Box<dyn DeviceSensor>>,
    bindings: Vec<ChannelBinding>,
    trans_factor: f64,
    rot_factor: f64,
    // reset, mode toggle, coupling
    held: [bool; 3],
}

impl DeviceInput {
    /// Build a device from an explicit binding table.
    pub fn new(
        sensors: Vec<Box<dyn DeviceSensor>>,
        bindings: Vec<ChannelBinding>,
        trans_factor: f64,
        rot_factor: f64,
    ) -> Self {
        Self {
            sensors,
            bindings,
            trans_factor,
            rot_factor,
            held: [false; 3],
        }
    }

    /// Build a device from a built-in preset.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::Config`] when fewer sensors are supplied than the
    /// profile reads from.
    pub fn from_profile(profile: DeviceProfile, sensors: Vec<Box<dyn DeviceSensor>>) -> Result<Self, HyperError> {
        if sensors.len() < profile.sensor_count() {
            return Err(HyperError::config(format!(
                "{profile:?} needs {} sensor(s), got {}",
                profile.sensor_count(),
                sensors.len()
            )));
        }
        Ok(Self::new(sensors, profile.bindings(), profile.trans_factor(), profile.rot_factor()))
    }

    pub fn trans_factor(&self) -> f64 {
        self.trans_factor
    }

    pub fn rot_factor(&self) -> f64 {
        self.rot_factor
    }

    pub fn bindings(&self) -> &[ChannelBinding] {
        &self.bindings
    }

    /// Evaluate all bindings against the current sensor state.
    pub fn sample(&mut self) -> InputSample {
        let mut dof = DofVector::zero();
        let mut pressed = [false; 3];

        for binding in &self.bindings {
            let value = match self.evaluate(binding) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "input binding skipped this frame");
                    continue;
                }
            };
            match binding.target {
                BindingTarget::Dof(channel) => dof[channel] += value,
                BindingTarget::Reset => pressed[0] |= value > 0.5,
                BindingTarget::ModeToggle => pressed[1] |= value > 0.5,
                BindingTarget::Coupling => pressed[2] |= value > 0.5,
            }
        }

        let edges: [bool; 3] = std::array::from_fn(|i| pressed[i] && !self.held[i]);
        self.held = pressed;

        InputSample {
            dof,
            reset: edges[0],
            mode_toggle: edges[1],
            coupling: edges[2],
        }
    }

    fn evaluate(&self, binding: &ChannelBinding) -> Result<f64, HyperError> {
        let fail = |details: String| HyperError::InputBinding {
            binding: binding.label(),
            details,
        };

        if let BindingTarget::Dof(channel) = binding.target
            && channel >= DOF_CHANNELS
        {
            return Err(fail(format!("channel {channel} out of range")));
        }
        let sensor = self
            .sensors
            .get(binding.source.sensor)
            .ok_or_else(|| fail(format!("no sensor {}", binding.source.sensor)))?;
        if !sensor.is_available() {
            return Ok(0.0);
        }

        let raw = match binding.source.kind {
            SourceKind::Value => sensor.value(binding.source.index),
            SourceKind::Button => sensor
                .button(binding.source.index)
                .map(|pressed| if pressed { 1.0 } else { 0.0 }),
        }
        .ok_or_else(|| {
            fail(format!(
                "{} has no {:?} {}",
                sensor.station(),
                binding.source.kind,
                binding.source.index
            ))
        })?;

        let value = match &binding.filter {
            ChannelFilter::Raw => raw * binding.gain,
            ChannelFilter::Filtered(params) => filter_channel(raw * binding.gain, params),
        };
        if !value.is_finite() {
            return Err(fail(format!("non-finite result {value}")));
        }
        Ok(value)
    }
}
