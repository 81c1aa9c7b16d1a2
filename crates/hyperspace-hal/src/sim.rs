//! In-process simulated drivers for tests and headless runs.
//!
//! Every simulated driver is a cheap `Clone` handle over shared state, so a
//! test can hand one clone to the component under test and keep another to
//! script inputs or inspect recorded commands.
//!
//! | Driver | Stub behaviour |
//! |---|---|
//! | [`SimShutterController`] | Records every call and keeps the resulting event tables; failures can be scripted per operation. |
//! | [`StaticTracking`] | Returns matrices set with [`StaticTracking::set`]. |
//! | [`SimGround`] | Intersects downward rays with horizontal rectangles. |
//! | [`SimDeviceSensor`] | Returns values and buttons set by the test. |
//!
//! # Example
//!
//! ```rust
//! use hyperspace_hal::sim::SimHardware;
//! use hyperspace_hal::TrackingService;
//! use glam::{DMat4, DVec3};
//!
//! let hw = SimHardware::builder()
//!     .with_tracking_target("tracking-head-1", DMat4::from_translation(DVec3::new(0.0, 1.7, 0.0)))
//!     .with_flat_ground(0.0)
//!     .with_sensor("device-spacemouse", 6, 2)
//!     .build();
//!
//! assert!(hw.tracking.get_transform("tracking-head-1").is_some());
//! assert_eq!(hw.sensors.len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use glam::{DMat4, DVec3};
use hyperspace_types::{GlassesId, HyperError};

use crate::device::DeviceSensor;
use crate::ground::{GROUND_PICK_MASK, GroundPicker, Hit};
use crate::shutter::{MasterConfig, ShutterController};
use crate::status;
use crate::tracking::TrackingService;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ────────────────────────────────────────────────────────────────────────────
// Shutter controller
// ────────────────────────────────────────────────────────────────────────────

/// One recorded controller call.
#[derive(Debug, Clone, PartialEq)]
pub enum ShutterCall {
    Open,
    LoadConfig(PathBuf),
    SendShutterConfig,
    SetTimerValue { glasses: GlassesId, event: usize, time_us: u32 },
    SetShutterValue { glasses: GlassesId, event: usize, value: u8 },
    SetShutterConst { glasses: GlassesId, value: u8, enabled: bool },
    SendMasterConfig(MasterConfig),
}

/// Tables and call log of a [`SimShutterController`].
#[derive(Debug, Clone, Default)]
pub struct SimShutterState {
    /// Successful calls in order.
    pub calls: Vec<ShutterCall>,
    pub timers: BTreeMap<(GlassesId, usize), u32>,
    pub values: BTreeMap<(GlassesId, usize), u8>,
    /// Constant overrides: `glasses -> (value, enabled)`.
    pub consts: BTreeMap<GlassesId, (u8, bool)>,
    /// Number of successful `send_shutter_config` calls.
    pub sent_configs: usize,
    pub master: Option<MasterConfig>,
    pub loaded_configs: Vec<PathBuf>,
    scripted: HashMap<String, Vec<String>>,
}

impl SimShutterState {
    /// `true` when `glasses` currently has an enabled constant override.
    pub fn is_const(&self, glasses: GlassesId) -> bool {
        self.consts.get(&glasses).is_some_and(|(_, enabled)| *enabled)
    }

    /// Event table of `glasses` as `(time, value)` pairs ordered by event.
    pub fn events(&self, glasses: GlassesId) -> Vec<(u32, u8)> {
        self.timers
            .range((glasses, 0)..=(glasses, usize::MAX))
            .map(|((_, event), time)| {
                let value = self.values.get(&(glasses, *event)).copied().unwrap_or(0);
                (*time, value)
            })
            .collect()
    }
}

/// Simulated radio master.
#[derive(Debug, Clone)]
pub struct SimShutterController {
    id: String,
    state: Arc<Mutex<SimShutterState>>,
}

impl SimShutterController {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(SimShutterState::default())),
        }
    }

    /// Copy of the current tables and call log.
    pub fn snapshot(&self) -> SimShutterState {
        lock(&self.state).clone()
    }

    /// Forget all recorded calls, keeping the tables.
    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Make the next call of `operation` report `output` as its status
    /// string, e.g. `fail_next("send_shutter_config", "error: timeout")`.
    pub fn fail_next(&self, operation: &str, output: &str) {
        lock(&self.state)
            .scripted
            .entry(operation.to_string())
            .or_default()
            .push(output.to_string());
    }

    fn run(&self, operation: &str, call: ShutterCall) -> Result<(), HyperError> {
        let mut state = lock(&self.state);
        if let Some(queue) = state.scripted.get_mut(operation)
            && !queue.is_empty()
        {
            let output = queue.remove(0);
            status::check(operation, &output)?;
        }
        match &call {
            ShutterCall::Open => {}
            ShutterCall::LoadConfig(path) => state.loaded_configs.push(path.clone()),
            ShutterCall::SendShutterConfig => state.sent_configs += 1,
            ShutterCall::SetTimerValue { glasses, event, time_us } => {
                state.timers.insert((*glasses, *event), *time_us);
            }
            ShutterCall::SetShutterValue { glasses, event, value } => {
                state.values.insert((*glasses, *event), *value);
            }
            ShutterCall::SetShutterConst { glasses, value, enabled } => {
                state.consts.insert(*glasses, (*value, *enabled));
            }
            ShutterCall::SendMasterConfig(master) => state.master = Some(*master),
        }
        state.calls.push(call);
        Ok(())
    }
}

impl ShutterController for SimShutterController {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self) -> Result<(), HyperError> {
        self.run("openHID", ShutterCall::Open)
    }

    fn load_config(&mut self, path: &Path) -> Result<(), HyperError> {
        self.run("load_config", ShutterCall::LoadConfig(path.to_path_buf()))
    }

    fn send_shutter_config(&mut self) -> Result<(), HyperError> {
        self.run("send_shutter_config", ShutterCall::SendShutterConfig)
    }

    fn set_timer_value(&mut self, glasses: GlassesId, event: usize, time_us: u32) -> Result<(), HyperError> {
        self.run("set_timer_value", ShutterCall::SetTimerValue { glasses, event, time_us })
    }

    fn set_shutter_value(&mut self, glasses: GlassesId, event: usize, value: u8) -> Result<(), HyperError> {
        self.run("set_shutter_value", ShutterCall::SetShutterValue { glasses, event, value })
    }

    fn set_shutter_const(&mut self, glasses: GlassesId, value: u8, enabled: bool) -> Result<(), HyperError> {
        self.run("set_shutter_const", ShutterCall::SetShutterConst { glasses, value, enabled })
    }

    fn send_master_config(&mut self, master: &MasterConfig) -> Result<(), HyperError> {
        self.run("send_master_config", ShutterCall::SendMasterConfig(*master))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tracking
// ────────────────────────────────────────────────────────────────────────────

/// Tracking service returning fixed, scriptable matrices.
#[derive(Debug, Clone, Default)]
pub struct StaticTracking {
    targets: Arc<Mutex<HashMap<String, DMat4>>>,
}

impl StaticTracking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, target: impl Into<String>, matrix: DMat4) {
        lock(&self.targets).insert(target.into(), matrix);
    }

    /// Stop reporting `target`.
    pub fn remove(&self, target: &str) {
        lock(&self.targets).remove(target);
    }
}

impl TrackingService for StaticTracking {
    fn get_transform(&self, target: &str) -> Option<DMat4> {
        lock(&self.targets).get(target).copied()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ground
// ────────────────────────────────────────────────────────────────────────────

/// Horizontal rectangle at `height`, bounded in X/Z.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPlane {
    pub name: String,
    pub height: f64,
    pub min_xz: [f64; 2],
    pub max_xz: [f64; 2],
}

/// Ground made of horizontal rectangles, all in one pick mask.
#[derive(Debug, Clone)]
pub struct SimGround {
    mask: String,
    planes: Vec<GroundPlane>,
}

impl Default for SimGround {
    fn default() -> Self {
        Self {
            mask: GROUND_PICK_MASK.to_string(),
            planes: Vec::new(),
        }
    }
}

impl SimGround {
    pub fn new() -> Self {
        Self::default()
    }

    /// An unbounded plane at `height`.
    pub fn flat(height: f64) -> Self {
        Self::new().with_plane("floor", height, [f64::NEG_INFINITY; 2], [f64::INFINITY; 2])
    }

    pub fn with_plane(mut self, name: &str, height: f64, min_xz: [f64; 2], max_xz: [f64; 2]) -> Self {
        self.planes.push(GroundPlane {
            name: name.to_string(),
            height,
            min_xz,
            max_xz,
        });
        self
    }
}

impl GroundPicker for SimGround {
    fn raycast(&self, origin: DVec3, direction: DVec3, max_length: f64, mask: &str) -> Vec<Hit> {
        let dir = direction.normalize_or_zero();
        if mask != self.mask || dir.y >= 0.0 {
            return Vec::new();
        }
        let mut hits: Vec<Hit> = self
            .planes
            .iter()
            .filter_map(|plane| {
                let distance = (origin.y - plane.height) / -dir.y;
                if !(0.0..=max_length).contains(&distance) {
                    return None;
                }
                let p = origin + dir * distance;
                let inside = p.x >= plane.min_xz[0]
                    && p.x <= plane.max_xz[0]
                    && p.z >= plane.min_xz[1]
                    && p.z <= plane.max_xz[1];
                inside.then(|| Hit {
                    distance,
                    object: plane.name.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Device sensor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SensorState {
    available: bool,
    values: Vec<f64>,
    buttons: Vec<bool>,
}

/// Scriptable input daemon station.
#[derive(Debug, Clone)]
pub struct SimDeviceSensor {
    station: String,
    state: Arc<Mutex<SensorState>>,
}

impl SimDeviceSensor {
    /// A station with `values` analog channels and `buttons` buttons, all zero.
    pub fn new(station: impl Into<String>, values: usize, buttons: usize) -> Self {
        Self {
            station: station.into(),
            state: Arc::new(Mutex::new(SensorState {
                available: true,
                values: vec![0.0; values],
                buttons: vec![false; buttons],
            })),
        }
    }

    /// Set analog channel `index`; out-of-range indices are ignored.
    pub fn set_value(&self, index: usize, value: f64) {
        if let Some(v) = lock(&self.state).values.get_mut(index) {
            *v = value;
        }
    }

    /// Set button `index`; out-of-range indices are ignored.
    pub fn set_button(&self, index: usize, pressed: bool) {
        if let Some(b) = lock(&self.state).buttons.get_mut(index) {
            *b = pressed;
        }
    }

    pub fn set_available(&self, available: bool) {
        lock(&self.state).available = available;
    }
}

impl DeviceSensor for SimDeviceSensor {
    fn station(&self) -> &str {
        &self.station
    }

    fn is_available(&self) -> bool {
        lock(&self.state).available
    }

    fn value(&self, index: usize) -> Option<f64> {
        lock(&self.state).values.get(index).copied()
    }

    fn button(&self, index: usize) -> Option<bool> {
        lock(&self.state).buttons.get(index).copied()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// A full set of simulated collaborators.
#[derive(Debug, Clone)]
pub struct SimHardware {
    pub tracking: StaticTracking,
    pub ground: SimGround,
    pub shutter: SimShutterController,
    pub sensors: Vec<SimDeviceSensor>,
}

impl SimHardware {
    pub fn builder() -> SimHardwareBuilder {
        SimHardwareBuilder::default()
    }

    /// Sensor serving `station`, if one was added.
    pub fn sensor(&self, station: &str) -> Option<&SimDeviceSensor> {
        self.sensors.iter().find(|s| s.station == station)
    }
}

/// Builder for [`SimHardware`].
#[derive(Debug, Default)]
pub struct SimHardwareBuilder {
    tracking: StaticTracking,
    ground: SimGround,
    sensors: Vec<SimDeviceSensor>,
}

impl SimHardwareBuilder {
    pub fn with_tracking_target(self, name: &str, matrix: DMat4) -> Self {
        self.tracking.set(name, matrix);
        self
    }

    pub fn with_flat_ground(mut self, height: f64) -> Self {
        self.ground = self
            .ground
            .with_plane("floor", height, [f64::NEG_INFINITY; 2], [f64::INFINITY; 2]);
        self
    }

    pub fn with_ground_plane(mut self, name: &str, height: f64, min_xz: [f64; 2], max_xz: [f64; 2]) -> Self {
        self.ground = self.ground.with_plane(name, height, min_xz, max_xz);
        self
    }

    pub fn with_sensor(mut self, station: &str, values: usize, buttons: usize) -> Self {
        self.sensors.push(SimDeviceSensor::new(station, values, buttons));
        self
    }

    pub fn build(self) -> SimHardware {
        SimHardware {
            tracking: self.tracking,
            ground: self.ground,
            shutter: SimShutterController::new("sim-radio-master"),
            sensors: self.sensors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutter_records_tables() {
        let sim = SimShutterController::new("sim");
        let mut driver: Box<dyn ShutterController> = Box::new(sim.clone());
        driver.set_timer_value(GlassesId(2), 1, 8175).unwrap();
        driver.set_shutter_value(GlassesId(2), 1, 0x44).unwrap();
        driver.set_timer_value(GlassesId(2), 0, 0).unwrap();
        driver.set_shutter_value(GlassesId(2), 0, 0x22).unwrap();
        driver.set_shutter_const(GlassesId(3), 0x00, true).unwrap();
        driver.send_shutter_config().unwrap();

        let state = sim.snapshot();
        assert_eq!(state.events(GlassesId(2)), vec![(0, 0x22), (8175, 0x44)]);
        assert!(state.is_const(GlassesId(3)));
        assert!(!state.is_const(GlassesId(2)));
        assert_eq!(state.sent_configs, 1);
        assert_eq!(state.calls.len(), 6);
    }

    #[test]
    fn scripted_failure_fires_once() {
        let mut sim = SimShutterController::new("sim");
        sim.fail_next("send_shutter_config", "error: usb timeout");
        let err = sim.send_shutter_config().unwrap_err();
        assert!(matches!(err, HyperError::HardwareFault { .. }));
        assert_eq!(sim.snapshot().sent_configs, 0);

        sim.send_shutter_config().unwrap();
        assert_eq!(sim.snapshot().sent_configs, 1);
    }

    #[test]
    fn scripted_success_output_passes() {
        let mut sim = SimShutterController::new("sim");
        sim.fail_next("openHID", "opened device 0x16c0");
        sim.open().unwrap();
        assert_eq!(sim.snapshot().calls, vec![ShutterCall::Open]);
    }

    #[test]
    fn flat_ground_hit_distance() {
        let ground = SimGround::flat(0.0);
        let hits = ground.raycast(DVec3::new(3.0, 1.5, -2.0), DVec3::NEG_Y, 10.0, GROUND_PICK_MASK);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 1.5).abs() < 1e-9);
    }

    #[test]
    fn ground_misses_outside_length_mask_and_bounds() {
        let ground = SimGround::new().with_plane("step", 0.5, [0.0, 0.0], [1.0, 1.0]);
        assert!(ground.raycast(DVec3::new(0.5, 20.0, 0.5), DVec3::NEG_Y, 10.0, GROUND_PICK_MASK).is_empty());
        assert!(ground.raycast(DVec3::new(0.5, 1.0, 0.5), DVec3::NEG_Y, 10.0, "other").is_empty());
        assert!(ground.raycast(DVec3::new(2.0, 1.0, 0.5), DVec3::NEG_Y, 10.0, GROUND_PICK_MASK).is_empty());
        assert!(ground.raycast(DVec3::new(0.5, 1.0, 0.5), DVec3::Y, 10.0, GROUND_PICK_MASK).is_empty());
    }

    #[test]
    fn ground_hits_sorted_nearest_first() {
        let ground = SimGround::flat(0.0).with_plane("table", 0.8, [-1.0, -1.0], [1.0, 1.0]);
        let hits = ground.raycast(DVec3::new(0.0, 2.0, 0.0), DVec3::NEG_Y, 10.0, GROUND_PICK_MASK);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].object, "table");
        assert_eq!(hits[1].object, "floor");
    }

    #[test]
    fn sensor_handles_share_state() {
        let sensor = SimDeviceSensor::new("device-xbox", 4, 8);
        let reader: Box<dyn DeviceSensor> = Box::new(sensor.clone());
        sensor.set_value(2, -0.7);
        sensor.set_button(6, true);
        sensor.set_value(99, 1.0);
        assert_eq!(reader.value(2), Some(-0.7));
        assert_eq!(reader.button(6), Some(true));
        assert_eq!(reader.value(4), None);
        sensor.set_available(false);
        assert!(!reader.is_available());
    }

    #[test]
    fn static_tracking_set_and_remove() {
        let tracking = StaticTracking::new();
        tracking.set("tracking-glasses-1", DMat4::IDENTITY);
        assert!(tracking.get_transform("tracking-glasses-1").is_some());
        tracking.remove("tracking-glasses-1");
        assert!(tracking.get_transform("tracking-glasses-1").is_none());
    }

    #[test]
    fn builder_wires_everything() {
        let hw = SimHardware::builder()
            .with_tracking_target("tracking-head", DMat4::IDENTITY)
            .with_ground_plane("ramp", 0.2, [0.0, 0.0], [4.0, 4.0])
            .with_sensor("device-mouse", 2, 3)
            .with_sensor("device-keyboard0", 0, 9)
            .build();
        assert!(hw.sensor("device-keyboard0").is_some());
        assert!(hw.sensor("device-globefish").is_none());
        assert_eq!(hw.shutter.id(), "sim-radio-master");
        let hits = hw.ground.raycast(DVec3::new(1.0, 1.0, 1.0), DVec3::NEG_Y, 5.0, GROUND_PICK_MASK);
        assert_eq!(hits[0].object, "ramp");
    }
}
