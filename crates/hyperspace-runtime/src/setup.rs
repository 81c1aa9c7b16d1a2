//! Declarative scene setup.
//!
//! A [`SetupConfig`] lists displays, users, navigations and portals and is
//! turned into a ready [`FrameScheduler`] by [`SetupConfig::build`].  It is
//! normally read from the `[setup]` table of the CLI config file:
//!
//! ```toml
//! [setup]
//! total_glasses = 6
//!
//! [[setup.displays]]
//! name = "small_powerwall"
//! displaystrings = [":0.0", ":0.1"]
//!
//! [[setup.users]]
//! name = "alice"
//! glasses = 1
//! display = "small_powerwall"
//!
//! [[setup.navigations]]
//! name = "spacemouse"
//! device = "Spacemouse"
//! device_name = "device-spacemouse"
//!
//! [[setup.portals]]
//! kind = "bidirectional"
//! first = { position = [0.0, 0.0, -4.0] }
//! second = { position = [50.0, 0.0, -4.0] }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use glam::{DMat4, DVec3};
use hyperspace_hal::sim::SimHardware;
use hyperspace_hal::{DeviceSensor, GroundPicker, ShutterController, TrackingService, TrackingTarget};
use hyperspace_navigation::{
    DeviceInput, DeviceProfile, GroundFollowingSettings, NavigationConfig, NavigationState, PortalTransitDetector,
    TraceSettings,
};
use hyperspace_slots::{
    ActivityZone, DisplayConfig, PhysicalDisplay, UploaderSettings, UserDescriptor, UserRegistry,
};
use hyperspace_types::{DisplayId, GlassesId, HyperError, NavMode, NavigationId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::frame_loop::{FrameScheduler, NavigationRig};

// ────────────────────────────────────────────────────────────────────────────
// Hardware
// ────────────────────────────────────────────────────────────────────────────

/// The collaborators a scene is built on.
pub struct Hardware {
    pub tracking: Box<dyn TrackingService>,
    pub ground: Option<Box<dyn GroundPicker>>,
    pub shutter: Box<dyn ShutterController>,
    pub sensors: Vec<Box<dyn DeviceSensor>>,
}

impl Hardware {
    /// Remove and return the sensor serving `station`.
    pub fn take_sensor(&mut self, station: &str) -> Option<Box<dyn DeviceSensor>> {
        let index = self.sensors.iter().position(|s| s.station() == station)?;
        Some(self.sensors.remove(index))
    }
}

impl From<SimHardware> for Hardware {
    fn from(hw: SimHardware) -> Self {
        Self {
            tracking: Box::new(hw.tracking),
            ground: Some(Box::new(hw.ground)),
            shutter: Box::new(hw.shutter),
            sensors: hw
                .sensors
                .into_iter()
                .map(|s| Box::new(s) as Box<dyn DeviceSensor>)
                .collect(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Config types
// ────────────────────────────────────────────────────────────────────────────

/// Position plus heading in the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub position: DVec3,
    #[serde(default)]
    pub yaw_deg: f64,
}

impl Placement {
    pub fn at(position: DVec3) -> Self {
        Self { position, yaw_deg: 0.0 }
    }

    pub fn matrix(&self) -> DMat4 {
        DMat4::from_translation(self.position) * DMat4::from_rotation_y(self.yaw_deg.to_radians())
    }
}

fn default_no_tracking_position() -> DVec3 {
    DVec3::new(0.0, 1.75, 1.6)
}

fn default_eye_distance() -> f64 {
    0.065
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSetup {
    pub name: String,
    #[serde(default)]
    pub vip: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub glasses: Option<u32>,
    /// Name of the display the user starts on.
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub headtracking_target: Option<String>,
    #[serde(default = "default_no_tracking_position")]
    pub no_tracking_position: DVec3,
    #[serde(default = "default_eye_distance")]
    pub eye_distance: f64,
    #[serde(default)]
    pub activity_zone: Option<ActivityZone>,
}

impl UserSetup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vip: false,
            active: true,
            glasses: None,
            display: None,
            headtracking_target: None,
            no_tracking_position: default_no_tracking_position(),
            eye_distance: default_eye_distance(),
            activity_zone: None,
        }
    }
}

fn default_start_scale() -> f64 {
    1.0
}

fn default_min_scale() -> f64 {
    0.0001
}

fn default_max_scale() -> f64 {
    10000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationSetup {
    pub name: String,
    /// No device means the navigation is only moved by portals.
    #[serde(default)]
    pub device: Option<DeviceProfile>,
    #[serde(default)]
    pub device_name: String,
    /// Replaces the profile's default sensor stations.
    #[serde(default)]
    pub stations: Option<Vec<String>>,
    /// Tracked device matrix relative to the platform.
    #[serde(default)]
    pub tracking_target: Option<String>,
    #[serde(default)]
    pub no_tracking_position: DVec3,
    #[serde(default)]
    pub start: Placement,
    #[serde(default = "default_start_scale")]
    pub start_scale: f64,
    #[serde(default = "default_min_scale")]
    pub min_scale: f64,
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub start_mode: NavMode,
    #[serde(default)]
    pub reacts_on_portal_transit: bool,
    #[serde(default)]
    pub ground_following: Option<GroundFollowingSettings>,
    #[serde(default)]
    pub trace: Option<TraceSettings>,
}

impl NavigationSetup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: None,
            device_name: String::new(),
            stations: None,
            tracking_target: None,
            no_tracking_position: DVec3::ZERO,
            start: Placement::default(),
            start_scale: default_start_scale(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            invert: false,
            start_mode: NavMode::default(),
            reacts_on_portal_transit: false,
            ground_following: None,
            trace: None,
        }
    }

    /// Sensor stations this navigation reads, in profile order.
    pub fn stations(&self) -> Vec<String> {
        match (&self.stations, self.device) {
            (Some(stations), _) => stations.clone(),
            (None, Some(profile)) => profile.default_stations(&self.device_name),
            (None, None) => Vec::new(),
        }
    }
}

fn default_portal_width() -> f64 {
    2.0
}

fn default_portal_height() -> f64 {
    2.5
}

fn default_exit_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortalSetup {
    /// Two places connected in both directions.
    Bidirectional {
        first: Placement,
        second: Placement,
        #[serde(default = "default_portal_width")]
        width: f64,
        #[serde(default = "default_portal_height")]
        height: f64,
    },
    OneWay {
        entry: Placement,
        exit: Placement,
        #[serde(default = "default_exit_scale")]
        exit_scale: f64,
        #[serde(default = "default_portal_width")]
        width: f64,
        #[serde(default = "default_portal_height")]
        height: f64,
        #[serde(default = "default_true")]
        transit: bool,
    },
}

fn default_total_glasses() -> u32 {
    6
}

fn default_deferred_open_frames() -> u32 {
    9
}

fn default_scale_stop_secs() -> f64 {
    1.0
}

fn default_idle_shutter_value() -> String {
    "00".to_string()
}

/// Everything needed to build a [`FrameScheduler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    #[serde(default = "default_total_glasses")]
    pub total_glasses: u32,
    #[serde(default = "default_deferred_open_frames")]
    pub deferred_open_frames: u32,
    #[serde(default = "default_scale_stop_secs")]
    pub scale_stop_secs: f64,
    /// Hex byte, e.g. `"00"` or `"0x00"`.
    #[serde(default = "default_idle_shutter_value")]
    pub idle_shutter_value: String,
    #[serde(default)]
    pub shutter_config_path: Option<PathBuf>,
    #[serde(default)]
    pub log_uploaded_table: bool,
    #[serde(default)]
    pub displays: Vec<DisplayConfig>,
    #[serde(default)]
    pub users: Vec<UserSetup>,
    #[serde(default)]
    pub navigations: Vec<NavigationSetup>,
    #[serde(default)]
    pub portals: Vec<PortalSetup>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            total_glasses: default_total_glasses(),
            deferred_open_frames: default_deferred_open_frames(),
            scale_stop_secs: default_scale_stop_secs(),
            idle_shutter_value: default_idle_shutter_value(),
            shutter_config_path: None,
            log_uploaded_table: false,
            displays: Vec::new(),
            users: Vec::new(),
            navigations: Vec::new(),
            portals: Vec::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Building
// ────────────────────────────────────────────────────────────────────────────

fn parse_hex_byte(field: &str, text: &str) -> Result<u8, HyperError> {
    let digits = text.trim().trim_start_matches("0x");
    u8::from_str_radix(digits, 16).map_err(|e| HyperError::config(format!("{field} {text:?}: {e}")))
}

impl SetupConfig {
    /// One passive-stereo powerwall with three users, a spacemouse
    /// navigation and a portal pair.
    pub fn demo() -> Self {
        let wall = DisplayConfig::large_powerwall();
        let users = (1..=3)
            .map(|n| {
                let mut user = UserSetup::new(format!("user-{n}"));
                user.glasses = Some(n);
                user.display = Some(wall.name.clone());
                user.headtracking_target = Some(format!("tracking-glasses-{n}"));
                user
            })
            .collect();

        let mut navigation = NavigationSetup::new("spacemouse");
        navigation.device = Some(DeviceProfile::Spacemouse);
        navigation.device_name = "device-spacemouse".to_string();
        navigation.reacts_on_portal_transit = true;
        navigation.trace = Some(TraceSettings::default());

        Self {
            displays: vec![wall],
            users,
            navigations: vec![navigation],
            portals: vec![PortalSetup::Bidirectional {
                first: Placement::at(DVec3::new(0.0, 0.0, -4.0)),
                second: Placement::at(DVec3::new(50.0, 0.0, -4.0)),
                width: default_portal_width(),
                height: default_portal_height(),
            }],
            ..Self::default()
        }
    }

    pub fn uploader_settings(&self) -> Result<UploaderSettings, HyperError> {
        Ok(UploaderSettings {
            total_glasses: self.total_glasses,
            deferred_open_frames: self.deferred_open_frames,
            idle_shutter_value: parse_hex_byte("idle_shutter_value", &self.idle_shutter_value)?,
            shutter_config_path: self.shutter_config_path.clone(),
            log_uploaded_table: self.log_uploaded_table,
            ..UploaderSettings::default()
        })
    }

    /// Simulated drivers matching this setup: one sensor per navigation
    /// station, every tracking target at its fallback position and a flat
    /// floor at height zero.
    pub fn simulated_hardware(&self) -> SimHardware {
        let mut builder = SimHardware::builder().with_flat_ground(0.0);
        for navigation in &self.navigations {
            for station in navigation.stations() {
                builder = builder.with_sensor(&station, 8, 16);
            }
            if let Some(target) = &navigation.tracking_target {
                builder = builder.with_tracking_target(target, DMat4::from_translation(navigation.no_tracking_position));
            }
        }
        for user in &self.users {
            if let Some(target) = &user.headtracking_target {
                builder = builder.with_tracking_target(target, DMat4::from_translation(user.no_tracking_position));
            }
        }
        builder.build()
    }

    /// Build the scene on `hardware`.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::Config`] for invalid values or a missing input
    /// sensor and [`HyperError::UnknownDisplay`] for a user placed on a
    /// display that is not listed.
    pub fn build(&self, mut hardware: Hardware) -> Result<FrameScheduler, HyperError> {
        let settings = self.uploader_settings()?;
        let scale_stop_duration = Duration::try_from_secs_f64(self.scale_stop_secs)
            .map_err(|e| HyperError::config(format!("scale_stop_secs: {e}")))?;

        let displays = self
            .displays
            .iter()
            .enumerate()
            .map(|(i, cfg)| PhysicalDisplay::from_config(DisplayId(i as u32), cfg))
            .collect::<Result<Vec<_>, _>>()?;

        let mut users = UserRegistry::new(self.total_glasses);
        for user in &self.users {
            users.register(self.user_descriptor(user, &displays)?)?;
        }

        let mut rigs = Vec::with_capacity(self.navigations.len());
        for (i, navigation) in self.navigations.iter().enumerate() {
            rigs.push(build_rig(NavigationId(i as u32), navigation, scale_stop_duration, &mut hardware)?);
        }

        let mut portals = PortalTransitDetector::new();
        for portal in &self.portals {
            match portal {
                PortalSetup::Bidirectional { first, second, width, height } => {
                    portals.add_bidirectional_portal(first.matrix(), second.matrix(), *width, *height);
                }
                PortalSetup::OneWay {
                    entry,
                    exit,
                    exit_scale,
                    width,
                    height,
                    transit,
                } => {
                    portals.add_portal(entry.matrix(), *width, *height, exit.matrix(), *exit_scale, *transit);
                }
            }
        }

        info!(
            displays = displays.len(),
            users = users.len(),
            navigations = rigs.len(),
            portals = portals.len(),
            "scene built"
        );

        let mut builder = FrameScheduler::builder(hardware.tracking, hardware.shutter, settings)
            .with_portals(portals)
            .with_users(users);
        if let Some(ground) = hardware.ground {
            builder = builder.with_ground(ground);
        }
        for display in displays {
            builder = builder.with_display(display);
        }
        for rig in rigs {
            builder = builder.with_navigation(rig);
        }
        Ok(builder.build())
    }

    fn user_descriptor(&self, user: &UserSetup, displays: &[PhysicalDisplay]) -> Result<UserDescriptor, HyperError> {
        let fallback = DMat4::from_translation(user.no_tracking_position);
        let headtracking = match &user.headtracking_target {
            Some(target) => TrackingTarget::new(target.clone(), fallback),
            None => TrackingTarget::untracked(fallback),
        };
        let mut descriptor = UserDescriptor::new(user.name.clone())
            .vip(user.vip)
            .active(user.active)
            .tracked_by(headtracking)
            .eye_distance(user.eye_distance);
        if let Some(glasses) = user.glasses {
            descriptor = descriptor.glasses(GlassesId(glasses));
        }
        if let Some(name) = &user.display {
            let display = displays
                .iter()
                .find(|d| d.name() == name)
                .ok_or_else(|| HyperError::UnknownDisplay(name.clone()))?;
            descriptor = descriptor.on_display(display.id());
        }
        if let Some(zone) = user.activity_zone {
            descriptor = descriptor.activity_zone(zone);
        }
        Ok(descriptor)
    }
}

fn build_rig(
    id: NavigationId,
    setup: &NavigationSetup,
    scale_stop_duration: Duration,
    hardware: &mut Hardware,
) -> Result<NavigationRig, HyperError> {
    let mut config = NavigationConfig {
        start_transform: setup.start.matrix(),
        start_scale: setup.start_scale,
        min_scale: setup.min_scale,
        max_scale: setup.max_scale,
        scale_stop_duration,
        invert: setup.invert,
        start_mode: setup.start_mode,
        reacts_on_portal_transit: setup.reacts_on_portal_transit,
        ground_following: setup.ground_following.clone(),
        trace: setup.trace.clone(),
        ..NavigationConfig::default()
    };

    let input = match setup.device {
        Some(profile) => {
            let mut sensors = Vec::new();
            for station in setup.stations() {
                let sensor = hardware.take_sensor(&station).ok_or_else(|| {
                    HyperError::config(format!("navigation {:?}: no sensor for station {station}", setup.name))
                })?;
                sensors.push(sensor);
            }
            let input = DeviceInput::from_profile(profile, sensors)?;
            config.trans_factor = input.trans_factor();
            config.rot_factor = input.rot_factor();
            Some(input)
        }
        None => None,
    };

    let fallback = DMat4::from_translation(setup.no_tracking_position);
    let reference = match &setup.tracking_target {
        Some(target) => TrackingTarget::new(target.clone(), fallback),
        None => TrackingTarget::untracked(fallback),
    };

    debug!(navigation = %id, name = %setup.name, device = ?setup.device, "navigation built");
    Ok(NavigationRig::new(NavigationState::new(id, config)?, input, reference))
}
