//! Shutter timing upload.
//!
//! Turns the slot runs of a [`SlotAssignmentScheduler`] pass into radio
//! master commands.  A run of `n` events per half takes its open half from
//! the first slot and its close half from the last slot, giving glasses events
//! `0..n` (open) and `n..2n` (close).
//!
//! A run that shrinks or keeps its length is uploaded at once.  A run that
//! grows is held back for [`UploaderSettings::deferred_open_frames`] frames so
//! the glasses do not open before the images of the new slots exist.  Glasses
//! without a stereo assignment are forced open with a constant command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hyperspace_hal::{MasterConfig, ShutterController};
use hyperspace_types::{GlassesId, HyperError};
use tracing::{debug, error, info, warn};

use crate::deferred::DeferredQueue;
use crate::display::PhysicalDisplay;
use crate::scheduler::{SlotAssignmentScheduler, SlotRun};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterCommand {
    SetTimerValue { glasses: GlassesId, event: usize, time_us: u32 },
    SetShutterValue { glasses: GlassesId, event: usize, value: u8 },
    SetShutterConst { glasses: GlassesId, value: u8, enabled: bool },
}

impl ShutterCommand {
    pub fn glasses(&self) -> GlassesId {
        match *self {
            ShutterCommand::SetTimerValue { glasses, .. }
            | ShutterCommand::SetShutterValue { glasses, .. }
            | ShutterCommand::SetShutterConst { glasses, .. } => glasses,
        }
    }

    /// # Errors
    ///
    /// Propagates the controller's [`HyperError::HardwareFault`].
    pub fn apply(&self, controller: &mut dyn ShutterController) -> Result<(), HyperError> {
        match *self {
            ShutterCommand::SetTimerValue { glasses, event, time_us } => controller.set_timer_value(glasses, event, time_us),
            ShutterCommand::SetShutterValue { glasses, event, value } => controller.set_shutter_value(glasses, event, value),
            ShutterCommand::SetShutterConst { glasses, value, enabled } => controller.set_shutter_const(glasses, value, enabled),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploaderSettings {
    pub total_glasses: u32,
    pub deferred_open_frames: u32,
    /// Constant shutter value that keeps idle glasses transparent.
    pub idle_shutter_value: u8,
    /// XML configuration loaded by `initialize` and `reset`.
    pub shutter_config_path: Option<PathBuf>,
    pub log_uploaded_table: bool,
    pub master: MasterConfig,
}

impl Default for UploaderSettings {
    fn default() -> Self {
        Self {
            total_glasses: 6,
            deferred_open_frames: 9,
            idle_shutter_value: 0x00,
            shutter_config_path: None,
            log_uploaded_table: false,
            master: MasterConfig::default(),
        }
    }
}

/// Last uploaded state of one pair of glasses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlassesTable {
    /// `event -> (time, value)`.
    pub events: BTreeMap<usize, (u32, u8)>,
    /// Enabled constant override.
    pub constant: Option<u8>,
}

/// Outcome of one [`ShutterTimingUploader::upload`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub immediate: Vec<GlassesId>,
    pub deferred: Vec<GlassesId>,
    pub idle: Vec<GlassesId>,
}

pub struct ShutterTimingUploader {
    controller: Box<dyn ShutterController>,
    settings: UploaderSettings,
    previous_runs: BTreeMap<GlassesId, usize>,
    deferred: DeferredQueue<ShutterCommand>,
    table: BTreeMap<GlassesId, GlassesTable>,
}

impl ShutterTimingUploader {
    pub fn new(controller: Box<dyn ShutterController>, settings: UploaderSettings) -> Self {
        Self {
            controller,
            settings,
            previous_runs: BTreeMap::new(),
            deferred: DeferredQueue::new(),
            table: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &UploaderSettings {
        &self.settings
    }

    pub fn pending_batches(&self) -> usize {
        self.deferred.len()
    }

    /// What the uploader last sent for `glasses`.
    pub fn uploaded(&self, glasses: GlassesId) -> Option<&GlassesTable> {
        self.table.get(&glasses)
    }

    /// Open the controller and bring it to the initial configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`HyperError::HardwareFault`] reported by the
    /// controller.
    pub fn initialize(&mut self) -> Result<(), HyperError> {
        self.controller.open()?;
        info!(controller = self.controller.id(), "shutter controller opened");
        self.reset()
    }

    /// Reload the initial configuration and master settings, e.g. at
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Returns the first [`HyperError::HardwareFault`] reported by the
    /// controller.
    pub fn reset(&mut self) -> Result<(), HyperError> {
        if let Some(path) = &self.settings.shutter_config_path {
            self.controller.load_config(path)?;
            info!(path = %path.display(), "shutter configuration loaded");
        }
        self.controller.send_shutter_config()?;
        self.controller.send_master_config(&self.settings.master)?;
        self.previous_runs.clear();
        self.table.clear();
        Ok(())
    }

    fn check_glasses(&self, glasses: GlassesId) -> Result<(), HyperError> {
        if glasses.0 == 0 || glasses.0 > self.settings.total_glasses {
            let err = HyperError::config(format!(
                "{glasses} exceeds the {} available glasses",
                self.settings.total_glasses
            ));
            error!(%err, "shutter upload aborted");
            return Err(err);
        }
        Ok(())
    }

    fn run_commands(&self, display: &PhysicalDisplay, run: &SlotRun, glasses: GlassesId) -> Option<Vec<ShutterCommand>> {
        let open = &display.slot(run.start)?.timing.as_ref()?.open;
        let close = &display.slot(run.end())?.timing.as_ref()?.close;
        let n = open.len();

        let mut commands = Vec::with_capacity(1 + 4 * n);
        commands.push(ShutterCommand::SetShutterConst {
            glasses,
            value: self.settings.idle_shutter_value,
            enabled: false,
        });
        let events = open.times.iter().zip(&open.values).chain(close.times.iter().zip(&close.values));
        for (event, (time_us, value)) in events.enumerate() {
            commands.push(ShutterCommand::SetTimerValue { glasses, event, time_us: *time_us });
            commands.push(ShutterCommand::SetShutterValue { glasses, event, value: *value });
        }
        Some(commands)
    }

    fn send(&mut self, commands: &[ShutterCommand]) -> Result<(), HyperError> {
        for command in commands {
            command.apply(self.controller.as_mut())?;
            let entry = self.table.entry(command.glasses()).or_default();
            match *command {
                ShutterCommand::SetTimerValue { event, time_us, .. } => {
                    entry.events.entry(event).or_insert((0, 0)).0 = time_us;
                }
                ShutterCommand::SetShutterValue { event, value, .. } => {
                    entry.events.entry(event).or_insert((0, 0)).1 = value;
                }
                ShutterCommand::SetShutterConst { value, enabled, .. } => {
                    entry.constant = enabled.then_some(value);
                }
            }
        }
        Ok(())
    }

    /// Upload the assignments of the last scheduler pass.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::Config`] for a glasses id outside
    /// `1..=total_glasses` and [`HyperError::HardwareFault`] when the
    /// controller fails; the pass should then be retried.
    pub fn upload(&mut self, scheduler: &SlotAssignmentScheduler) -> Result<UploadReport, HyperError> {
        let mut report = UploadReport::default();
        let mut immediate = Vec::new();
        let mut runs = BTreeMap::new();

        for assignment in scheduler.assignments() {
            let Some(display) = scheduler.display(assignment.display) else {
                return Err(HyperError::UnknownDisplay(assignment.display.to_string()));
            };
            for run in &assignment.runs {
                let Some(glasses) = run.glasses else {
                    continue;
                };
                self.check_glasses(glasses)?;
                let Some(commands) = self.run_commands(display, run, glasses) else {
                    continue;
                };

                let previous = self.previous_runs.get(&glasses).copied().unwrap_or(0);
                if run.len > previous {
                    debug!(%glasses, previous, next = run.len, "deferring opening run");
                    self.deferred.push(commands, self.settings.deferred_open_frames);
                    report.deferred.push(glasses);
                } else {
                    immediate.extend(commands);
                    report.immediate.push(glasses);
                }
                runs.insert(glasses, run.len);
            }
        }

        for id in 1..=self.settings.total_glasses {
            let glasses = GlassesId(id);
            if !runs.contains_key(&glasses) {
                immediate.push(ShutterCommand::SetShutterConst {
                    glasses,
                    value: self.settings.idle_shutter_value,
                    enabled: true,
                });
                report.idle.push(glasses);
            }
        }

        self.send(&immediate)?;
        self.controller.send_shutter_config()?;
        self.previous_runs = runs;
        if self.settings.log_uploaded_table {
            self.log_table();
        }
        Ok(report)
    }

    /// Count deferred batches down by one frame and upload the ones that
    /// became due.  Returns the number of released commands.
    ///
    /// # Errors
    ///
    /// Returns [`HyperError::HardwareFault`] when the controller fails.  The
    /// released batch is then queued again and retried on the next tick.
    pub fn tick(&mut self) -> Result<usize, HyperError> {
        let due = self.deferred.tick();
        if due.is_empty() {
            return Ok(0);
        }
        let sent = self.send(&due).and_then(|()| self.controller.send_shutter_config());
        if let Err(e) = sent {
            warn!(error = %e, commands = due.len(), "deferred shutter commands kept for next frame");
            self.deferred.retry(due);
            return Err(e);
        }
        debug!(commands = due.len(), "deferred shutter commands released");
        if self.settings.log_uploaded_table {
            self.log_table();
        }
        Ok(due.len())
    }

    fn log_table(&self) {
        let master = &self.settings.master;
        info!(
            transmit = master.transmit,
            external_clock = master.external_clock,
            period_us = master.period_us,
            offset_us = master.offset_us,
            "uploaded shutter configuration"
        );
        for (glasses, entry) in &self.table {
            let events: Vec<String> = entry.events.values().map(|(t, v)| format!("{t}:{v:#04x}")).collect();
            info!(%glasses, constant = ?entry.constant, events = %events.join(" "), "shutter");
        }
    }
}
