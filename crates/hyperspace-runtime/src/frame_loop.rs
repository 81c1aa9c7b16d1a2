//! [`FrameScheduler`] – the per-frame evaluation order.
//!
//! Each call to [`FrameScheduler::tick`] runs, in this order:
//!
//! 1. **Input** – for every navigation rig: read the tracked device matrix,
//!    sample the device, handle reset and mode toggle edges, apply the
//!    relative input and advance the navigation (transition, ground
//!    following, trace).
//! 2. **Portals** – teleport navigations that stepped through a portal.
//! 3. **Users** – re-evaluate user activity from head tracking.
//! 4. **Deferred shutter commands** – release batches that became due.
//! 5. **Slots** – when anything changed, reassign slots and upload timings.
//!
//! Hardware faults are logged and retried on the next frame; they never stop
//! the loop.

use std::time::Duration;

use hyperspace_hal::{GroundPicker, ShutterController, TrackingService, TrackingTarget};
use hyperspace_navigation::{DeviceInput, NavigationState, PortalTransitDetector};
use hyperspace_slots::{
    PhysicalDisplay, ShutterTimingUploader, SlotAssignmentScheduler, UploadReport, UploaderSettings, UserRegistry,
};
use hyperspace_types::{DisplayId, HyperError, NavigationId, PortalId, UserId};
use tracing::{debug, error, info, warn};

// ────────────────────────────────────────────────────────────────────────────
// Navigation rig
// ────────────────────────────────────────────────────────────────────────────

/// One navigation together with the device that steers it.
pub struct NavigationRig {
    pub nav: NavigationState,
    /// `None` for navigations that are only moved by portals or code.
    pub input: Option<DeviceInput>,
    /// Tracked device matrix, relative to the platform.
    pub reference: TrackingTarget,
}

impl NavigationRig {
    pub fn new(nav: NavigationState, input: Option<DeviceInput>, reference: TrackingTarget) -> Self {
        Self { nav, input, reference }
    }

    fn step(&mut self, dt: Duration, tracking: &dyn TrackingService, ground: Option<&dyn GroundPicker>) {
        self.nav.set_reference(self.reference.resolve(tracking));

        if let Some(input) = self.input.as_mut() {
            let sample = input.sample();
            if sample.reset {
                self.nav.reset();
            }
            if sample.mode_toggle && !self.nav.toggle_mode() {
                debug!(navigation = %self.nav.id(), "mode toggle ignored during transition");
            }
            if sample.coupling {
                debug!(navigation = %self.nav.id(), "coupling request ignored");
            }
            self.nav.apply_relative_input(&sample.dof);
        }

        self.nav.tick(dt, ground);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

/// What happened during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub transits: Vec<(NavigationId, PortalId)>,
    /// Upload result when slots were reassigned successfully this frame.
    pub upload: Option<UploadReport>,
    /// Deferred shutter commands released this frame.
    pub released_commands: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// FrameScheduler
// ────────────────────────────────────────────────────────────────────────────

pub struct FrameScheduler {
    tracking: Box<dyn TrackingService>,
    ground: Option<Box<dyn GroundPicker>>,
    rigs: Vec<NavigationRig>,
    portals: PortalTransitDetector,
    users: UserRegistry,
    slots: SlotAssignmentScheduler,
    uploader: ShutterTimingUploader,
    frame: u64,
}

impl FrameScheduler {
    pub fn builder(
        tracking: Box<dyn TrackingService>,
        shutter: Box<dyn ShutterController>,
        settings: UploaderSettings,
    ) -> FrameSchedulerBuilder {
        FrameSchedulerBuilder {
            tracking,
            shutter,
            settings,
            ground: None,
            rigs: Vec::new(),
            portals: PortalTransitDetector::new(),
            users: None,
            displays: Vec::new(),
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn navigations(&self) -> impl Iterator<Item = &NavigationState> {
        self.rigs.iter().map(|r| &r.nav)
    }

    pub fn navigation(&self, id: NavigationId) -> Option<&NavigationState> {
        self.navigations().find(|n| n.id() == id)
    }

    pub fn navigation_mut(&mut self, id: NavigationId) -> Option<&mut NavigationState> {
        self.rigs.iter_mut().map(|r| &mut r.nav).find(|n| n.id() == id)
    }

    pub fn portals(&self) -> &PortalTransitDetector {
        &self.portals
    }

    pub fn portals_mut(&mut self) -> &mut PortalTransitDetector {
        &mut self.portals
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn slots(&self) -> &SlotAssignmentScheduler {
        &self.slots
    }

    pub fn uploader(&self) -> &ShutterTimingUploader {
        &self.uploader
    }

    /// Open the shutter controller and load the initial configuration.
    ///
    /// # Errors
    ///
    /// Returns the controller's [`HyperError::HardwareFault`]; the frame loop
    /// can still run without it.
    pub fn initialize(&mut self) -> Result<(), HyperError> {
        self.uploader.initialize()
    }

    /// Put the shutter controller back into its initial configuration.
    ///
    /// # Errors
    ///
    /// Returns the controller's [`HyperError::HardwareFault`].
    pub fn shutdown(&mut self) -> Result<(), HyperError> {
        info!(frames = self.frame, "resetting shutter configuration");
        self.uploader.reset()
    }

    fn changed(&mut self, changed: bool) {
        if changed {
            self.slots.mark_dirty();
        }
    }

    pub fn set_user_active(&mut self, user: UserId, active: bool) -> Result<(), HyperError> {
        let changed = self.users.set_active(user, active)?;
        self.changed(changed);
        Ok(())
    }

    pub fn set_user_vip(&mut self, user: UserId, vip: bool) -> Result<(), HyperError> {
        let changed = self.users.set_vip(user, vip)?;
        self.changed(changed);
        Ok(())
    }

    /// Move `user` to another display, or off all displays with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::UnknownDisplay`] for a display that is not part
    /// of the setup.
    pub fn set_user_display(&mut self, user: UserId, display: Option<DisplayId>) -> Result<(), HyperError> {
        if let Some(id) = display
            && self.slots.display(id).is_none()
        {
            return Err(HyperError::UnknownDisplay(id.to_string()));
        }
        let changed = self.users.set_display(user, display)?;
        self.changed(changed);
        Ok(())
    }

    /// Advance everything by one frame of length `dt`.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::Config`] when the slot upload hits a wiring
    /// mistake; hardware faults are logged and retried instead.
    pub fn tick(&mut self, dt: Duration) -> Result<FrameReport, HyperError> {
        self.frame += 1;
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        let tracking = self.tracking.as_ref();
        let ground = self.ground.as_deref();
        for rig in &mut self.rigs {
            rig.step(dt, tracking, ground);
        }

        for rig in &mut self.rigs {
            if let Some(portal) = self.portals.check(&mut rig.nav) {
                report.transits.push((rig.nav.id(), portal));
            }
        }

        if self.users.update_activity(self.tracking.as_ref()) {
            self.slots.mark_dirty();
        }

        match self.uploader.tick() {
            Ok(released) => report.released_commands = released,
            Err(e) => warn!(error = %e, "deferred shutter commands failed, retrying next frame"),
        }

        if self.slots.is_dirty() {
            self.slots.assign(&self.users);
            match self.uploader.upload(&self.slots) {
                Ok(upload) => report.upload = Some(upload),
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "shutter upload failed, retrying next frame");
                    self.slots.mark_dirty();
                }
                Err(e) => {
                    error!(error = %e, "shutter upload rejected");
                    return Err(e);
                }
            }
        }

        Ok(report)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for [`FrameScheduler`].
pub struct FrameSchedulerBuilder {
    tracking: Box<dyn TrackingService>,
    shutter: Box<dyn ShutterController>,
    settings: UploaderSettings,
    ground: Option<Box<dyn GroundPicker>>,
    rigs: Vec<NavigationRig>,
    portals: PortalTransitDetector,
    users: Option<UserRegistry>,
    displays: Vec<PhysicalDisplay>,
}

impl FrameSchedulerBuilder {
    pub fn with_ground(mut self, ground: Box<dyn GroundPicker>) -> Self {
        self.ground = Some(ground);
        self
    }

    pub fn with_navigation(mut self, rig: NavigationRig) -> Self {
        self.rigs.push(rig);
        self
    }

    pub fn with_portals(mut self, portals: PortalTransitDetector) -> Self {
        self.portals = portals;
        self
    }

    pub fn with_users(mut self, users: UserRegistry) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_display(mut self, display: PhysicalDisplay) -> Self {
        self.displays.push(display);
        self
    }

    pub fn build(self) -> FrameScheduler {
        let users = self
            .users
            .unwrap_or_else(|| UserRegistry::new(self.settings.total_glasses));
        FrameScheduler {
            tracking: self.tracking,
            ground: self.ground,
            rigs: self.rigs,
            portals: self.portals,
            users,
            slots: SlotAssignmentScheduler::new(self.displays),
            uploader: ShutterTimingUploader::new(self.shutter, self.settings),
            frame: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DMat4, DVec3};
    use hyperspace_hal::sim::{SimDeviceSensor, SimGround, SimShutterController, StaticTracking};
    use hyperspace_navigation::{DeviceProfile, GroundFollowingSettings, NavigationConfig};
    use hyperspace_slots::{DisplayConfig, UserDescriptor};
    use hyperspace_types::{GlassesId, NavMode};

    const FRAME: Duration = Duration::from_millis(16);

    fn rig(sensor: &SimDeviceSensor, config: NavigationConfig) -> NavigationRig {
        let input = DeviceInput::from_profile(DeviceProfile::Spacemouse, vec![Box::new(sensor.clone())]).unwrap();
        NavigationRig::new(
            NavigationState::new(NavigationId(0), config).unwrap(),
            Some(input),
            TrackingTarget::untracked(DMat4::IDENTITY),
        )
    }

    fn scheduler(rig: NavigationRig, shutter: &SimShutterController) -> FrameScheduler {
        FrameScheduler::builder(
            Box::new(StaticTracking::new()),
            Box::new(shutter.clone()),
            UploaderSettings::default(),
        )
        .with_navigation(rig)
        .build()
    }

    #[test]
    fn device_input_moves_navigation() {
        let sensor = SimDeviceSensor::new("device-spacemouse", 6, 2);
        let mut fs = scheduler(rig(&sensor, NavigationConfig::default()), &SimShutterController::new("sim"));
        sensor.set_value(0, 0.82);
        fs.tick(FRAME).unwrap();
        let x = fs.navigation(NavigationId(0)).unwrap().translation().x;
        assert!(x > 0.0);
        assert_eq!(fs.frame(), 1);
    }

    #[test]
    fn unavailable_device_means_no_input() {
        let sensor = SimDeviceSensor::new("device-spacemouse", 6, 2);
        let mut fs = scheduler(rig(&sensor, NavigationConfig::default()), &SimShutterController::new("sim"));
        sensor.set_value(0, 0.82);
        sensor.set_available(false);
        fs.tick(FRAME).unwrap();
        assert_eq!(fs.navigation(NavigationId(0)).unwrap().translation(), DVec3::ZERO);
    }

    #[test]
    fn ground_mode_follows_ground() {
        let sensor = SimDeviceSensor::new("device-spacemouse", 6, 2);
        let config = NavigationConfig {
            start_mode: NavMode::GroundBased,
            ground_following: Some(GroundFollowingSettings::default()),
            ..NavigationConfig::default()
        };
        let mut fs = FrameScheduler::builder(
            Box::new(StaticTracking::new()),
            Box::new(SimShutterController::new("sim")),
            UploaderSettings::default(),
        )
        .with_ground(Box::new(SimGround::flat(0.5)))
        .with_navigation(rig(&sensor, config))
        .build();
        for _ in 0..200 {
            fs.tick(FRAME).unwrap();
        }
        let y = fs.navigation(NavigationId(0)).unwrap().translation().y;
        assert!((y - 0.5).abs() < 1e-2);
    }

    #[test]
    fn user_change_triggers_upload() {
        let shutter = SimShutterController::new("sim");
        let mut users = UserRegistry::new(6);
        let wall = PhysicalDisplay::from_config(DisplayId(0), &DisplayConfig::large_powerwall()).unwrap();
        let a = users
            .register(UserDescriptor::new("a").glasses(GlassesId(1)).on_display(DisplayId(0)))
            .unwrap();
        let mut fs = FrameScheduler::builder(
            Box::new(StaticTracking::new()),
            Box::new(shutter.clone()),
            UploaderSettings::default(),
        )
        .with_display(wall)
        .with_users(users)
        .build();

        assert!(fs.tick(FRAME).unwrap().upload.is_some());
        assert!(fs.tick(FRAME).unwrap().upload.is_none());

        fs.set_user_active(a, false).unwrap();
        let upload = fs.tick(FRAME).unwrap().upload.unwrap();
        assert!(upload.idle.contains(&GlassesId(1)));
        assert!(fs.set_user_display(a, Some(DisplayId(7))).is_err());
    }

    #[test]
    fn hardware_fault_is_retried() {
        let shutter = SimShutterController::new("sim");
        shutter.fail_next("send_shutter_config", "error: timeout");
        let mut fs = FrameScheduler::builder(
            Box::new(StaticTracking::new()),
            Box::new(shutter.clone()),
            UploaderSettings::default(),
        )
        .build();
        assert!(fs.tick(FRAME).unwrap().upload.is_none());
        assert!(fs.slots().is_dirty());
        assert!(fs.tick(FRAME).unwrap().upload.is_some());
    }
}
