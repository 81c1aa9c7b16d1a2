//! Slot assignment.
//!
//! For every physical display the users currently on it are split into
//! active default users, active VIPs and inactive users (registration order
//! within each group).  Every active user gets one slot; the remaining slots
//! go round-robin to the VIPs, or to the default users when there are no
//! VIPs.  Inactive users get none.  Slots are then handed out as contiguous
//! runs in the order default users, VIPs, inactive users.
//!
//! # Example
//!
//! ```rust
//! use hyperspace_slots::display::{DisplayConfig, PhysicalDisplay};
//! use hyperspace_slots::scheduler::SlotAssignmentScheduler;
//! use hyperspace_slots::user::{UserDescriptor, UserRegistry};
//! use hyperspace_types::DisplayId;
//!
//! let wall = PhysicalDisplay::from_config(DisplayId(0), &DisplayConfig::large_powerwall()).unwrap();
//! let mut users = UserRegistry::new(6);
//! let a = users.register(UserDescriptor::new("a").on_display(DisplayId(0))).unwrap();
//! let b = users.register(UserDescriptor::new("b").vip(true).on_display(DisplayId(0))).unwrap();
//!
//! let mut scheduler = SlotAssignmentScheduler::new(vec![wall]);
//! let runs = &scheduler.assign(&users)[0].runs;
//! assert_eq!((runs[0].user, runs[0].len), (a, 1));
//! assert_eq!((runs[1].user, runs[1].start, runs[1].len), (b, 1, 2));
//! ```

use std::ops::Range;

use hyperspace_types::{DisplayId, GlassesId, UserId};
use tracing::{info, warn};

use crate::display::PhysicalDisplay;
use crate::user::UserRegistry;

/// Contiguous slots given to one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRun {
    pub user: UserId,
    pub glasses: Option<GlassesId>,
    pub start: usize,
    pub len: usize,
}

impl SlotRun {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// Index of the last slot of the run.
    pub fn end(&self) -> usize {
        self.start + self.len - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAssignment {
    pub display: DisplayId,
    pub runs: Vec<SlotRun>,
}

/// How many slots each user of one display gets, in run order.
///
/// `default`, `vip` and `disabled` hold the active non-VIP, active VIP and
/// inactive users of the display.
pub fn distribute(capacity: usize, default: &[UserId], vip: &[UserId], disabled: &[UserId]) -> Vec<(UserId, usize)> {
    let mut default_counts: Vec<(UserId, usize)> = default.iter().map(|u| (*u, 1)).collect();
    let mut vip_counts: Vec<(UserId, usize)> = vip.iter().map(|u| (*u, 1)).collect();
    let disabled_counts = disabled.iter().map(|u| (*u, 0));

    let free = capacity.saturating_sub(default.len() + vip.len());
    let receivers = if vip_counts.is_empty() {
        &mut default_counts
    } else {
        &mut vip_counts
    };
    if !receivers.is_empty() {
        let n = receivers.len();
        for i in 0..free {
            receivers[i % n].1 += 1;
        }
    }

    default_counts.into_iter().chain(vip_counts).chain(disabled_counts).collect()
}

/// Owns the physical displays and their slot lists.
#[derive(Debug, Default)]
pub struct SlotAssignmentScheduler {
    displays: Vec<PhysicalDisplay>,
    assignments: Vec<DisplayAssignment>,
    dirty: bool,
}

impl SlotAssignmentScheduler {
    /// Starts dirty so the first frame assigns slots.
    pub fn new(displays: Vec<PhysicalDisplay>) -> Self {
        Self {
            displays,
            assignments: Vec::new(),
            dirty: true,
        }
    }

    pub fn displays(&self) -> &[PhysicalDisplay] {
        &self.displays
    }

    pub fn display(&self, id: DisplayId) -> Option<&PhysicalDisplay> {
        self.displays.iter().find(|d| d.id() == id)
    }

    pub fn display_by_name(&self, name: &str) -> Option<&PhysicalDisplay> {
        self.displays.iter().find(|d| d.name() == name)
    }

    /// Result of the last [`assign`](Self::assign).
    pub fn assignments(&self) -> &[DisplayAssignment] {
        &self.assignments
    }

    /// Request a new pass, e.g. after a user changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Reassign every slot of every display and clear the dirty flag.
    pub fn assign(&mut self, users: &UserRegistry) -> &[DisplayAssignment] {
        self.assignments.clear();

        for physical in &mut self.displays {
            let mut default = Vec::new();
            let mut vip = Vec::new();
            let mut disabled = Vec::new();
            for user in users.on_display(physical.id()) {
                match (user.is_active(), user.is_vip()) {
                    (false, _) => disabled.push(user.id()),
                    (true, false) => default.push(user.id()),
                    (true, true) => vip.push(user.id()),
                }
            }

            let capacity = physical.capacity();
            physical.clear_assignments();
            let mut runs = Vec::new();
            let mut next = 0;
            for (user, count) in distribute(capacity, &default, &vip, &disabled) {
                let len = count.min(capacity - next);
                if len < count {
                    warn!(user = %user, display = physical.name(), wanted = count, got = len, "display out of slots");
                }
                info!(user = %user, display = physical.name(), slots = len, "user - slot assignment");
                if len == 0 {
                    continue;
                }
                let run = SlotRun {
                    user,
                    glasses: users.get(user).and_then(|u| u.glasses()),
                    start: next,
                    len,
                };
                physical.assign(run.range(), user);
                next += len;
                runs.push(run);
            }

            self.assignments.push(DisplayAssignment {
                display: physical.id(),
                runs,
            });
        }

        self.dirty = false;
        &self.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayConfig;
    use crate::user::UserDescriptor;

    const WALL: DisplayId = DisplayId(0);

    fn wall_with_slots(n: usize) -> PhysicalDisplay {
        let mut cfg = DisplayConfig::large_powerwall();
        cfg.displaystrings = (0..n).map(|i| format!(":0.{i}")).collect();
        cfg.shutter_timings.truncate(n.max(1));
        PhysicalDisplay::from_config(WALL, &cfg).unwrap()
    }

    fn ids(n: u32) -> Vec<UserId> {
        (0..n).map(UserId).collect()
    }

    #[test]
    fn extra_slot_goes_to_first_default_user() {
        let counts = distribute(4, &ids(3), &[], &[]);
        assert_eq!(counts, vec![(UserId(0), 2), (UserId(1), 1), (UserId(2), 1)]);
    }

    #[test]
    fn vips_take_all_free_slots() {
        let counts = distribute(6, &[UserId(0)], &[UserId(1), UserId(2)], &[UserId(3)]);
        assert_eq!(
            counts,
            vec![(UserId(0), 1), (UserId(1), 3), (UserId(2), 2), (UserId(3), 0)]
        );
    }

    #[test]
    fn all_disabled_get_nothing() {
        let counts = distribute(3, &[], &[], &ids(2));
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn overfull_display_gets_one_each() {
        let counts = distribute(2, &ids(3), &[], &[]);
        assert!(counts.iter().all(|(_, n)| *n == 1));
    }

    #[test]
    fn vip_and_default_on_three_slots() {
        let mut users = UserRegistry::new(6);
        let a = users.register(UserDescriptor::new("a").glasses(GlassesId(4)).on_display(WALL)).unwrap();
        let b = users
            .register(UserDescriptor::new("b").vip(true).glasses(GlassesId(1)).on_display(WALL))
            .unwrap();
        let mut scheduler = SlotAssignmentScheduler::new(vec![wall_with_slots(3)]);
        let runs = scheduler.assign(&users)[0].runs.clone();
        assert_eq!(
            runs,
            vec![
                SlotRun { user: a, glasses: Some(GlassesId(4)), start: 0, len: 1 },
                SlotRun { user: b, glasses: Some(GlassesId(1)), start: 1, len: 2 },
            ]
        );
        let slots = scheduler.display(WALL).unwrap().slots();
        assert_eq!(slots[0].assigned_user, Some(a));
        assert_eq!(slots[2].assigned_user, Some(b));
    }

    #[test]
    fn runs_truncated_to_capacity() {
        let mut users = UserRegistry::new(6);
        for name in ["a", "b", "c", "d"] {
            users.register(UserDescriptor::new(name).on_display(WALL)).unwrap();
        }
        let mut scheduler = SlotAssignmentScheduler::new(vec![wall_with_slots(3)]);
        let runs = &scheduler.assign(&users)[0].runs;
        assert_eq!(runs.len(), 3);
        assert_eq!(runs.iter().map(|r| r.len).sum::<usize>(), 3);
    }

    #[test]
    fn inactive_users_release_slots() {
        let mut users = UserRegistry::new(6);
        let a = users.register(UserDescriptor::new("a").on_display(WALL)).unwrap();
        let b = users.register(UserDescriptor::new("b").on_display(WALL)).unwrap();
        let mut scheduler = SlotAssignmentScheduler::new(vec![wall_with_slots(3)]);
        assert_eq!(scheduler.assign(&users)[0].runs[0].len, 2);

        users.set_active(a, false).unwrap();
        let runs = scheduler.assign(&users)[0].runs.clone();
        assert_eq!(runs, vec![SlotRun { user: b, glasses: None, start: 0, len: 3 }]);
    }

    #[test]
    fn users_elsewhere_are_ignored() {
        let mut users = UserRegistry::new(6);
        users.register(UserDescriptor::new("a").on_display(DisplayId(9))).unwrap();
        users.register(UserDescriptor::new("b")).unwrap();
        let mut scheduler = SlotAssignmentScheduler::new(vec![wall_with_slots(3)]);
        assert!(scheduler.assign(&users)[0].runs.is_empty());
    }

    #[test]
    fn assignment_is_deterministic_and_clears_dirty() {
        let mut users = UserRegistry::new(6);
        for name in ["a", "b", "c"] {
            users.register(UserDescriptor::new(name).on_display(WALL)).unwrap();
        }
        let mut scheduler = SlotAssignmentScheduler::new(vec![wall_with_slots(3)]);
        assert!(scheduler.is_dirty());
        let first = scheduler.assign(&users).to_vec();
        assert!(!scheduler.is_dirty());
        scheduler.mark_dirty();
        assert_eq!(scheduler.assign(&users), first.as_slice());
    }
}
