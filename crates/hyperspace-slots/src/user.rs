//! Users and the user registry.
//!
//! Users are created through [`UserRegistry::register`], which issues ids in
//! registration order and checks glasses ids against the number of glasses in
//! the setup.  Every setter reports whether it changed anything so the caller
//! can mark the slot scheduler dirty.

use glam::{DMat4, DVec3};
use hyperspace_hal::{TrackingService, TrackingTarget};
use hyperspace_types::{DisplayId, GlassesId, HyperError, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Axis-aligned box in tracking space.  A head inside it (open bounds) marks
/// its user inactive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityZone {
    pub min: DVec3,
    pub max: DVec3,
}

impl ActivityZone {
    /// Glasses lying on the lab table next to the powerwall.
    pub fn glasses_table() -> Self {
        Self {
            min: DVec3::new(-2.4, 0.98, 0.16),
            max: DVec3::new(-1.5, 1.01, 1.35),
        }
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpgt(self.min).all() && p.cmplt(self.max).all()
    }
}

/// Everything needed to register a user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDescriptor {
    pub name: String,
    pub vip: bool,
    pub active: bool,
    pub glasses: Option<GlassesId>,
    pub display: Option<DisplayId>,
    pub headtracking: TrackingTarget,
    pub eye_distance: f64,
    pub activity_zone: Option<ActivityZone>,
}

impl UserDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vip: false,
            active: true,
            glasses: None,
            display: None,
            headtracking: TrackingTarget::untracked(DMat4::from_translation(DVec3::new(0.0, 1.75, 1.6))),
            eye_distance: 0.065,
            activity_zone: None,
        }
    }

    pub fn vip(mut self, vip: bool) -> Self {
        self.vip = vip;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn glasses(mut self, glasses: GlassesId) -> Self {
        self.glasses = Some(glasses);
        self
    }

    pub fn on_display(mut self, display: DisplayId) -> Self {
        self.display = Some(display);
        self
    }

    pub fn tracked_by(mut self, headtracking: TrackingTarget) -> Self {
        self.headtracking = headtracking;
        self
    }

    pub fn eye_distance(mut self, meters: f64) -> Self {
        self.eye_distance = meters;
        self
    }

    pub fn activity_zone(mut self, zone: ActivityZone) -> Self {
        self.activity_zone = Some(zone);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: UserId,
    name: String,
    vip: bool,
    active: bool,
    glasses: Option<GlassesId>,
    display: Option<DisplayId>,
    headtracking: TrackingTarget,
    eye_distance: f64,
    activity_zone: Option<ActivityZone>,
}

impl User {
    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_vip(&self) -> bool {
        self.vip
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn glasses(&self) -> Option<GlassesId> {
        self.glasses
    }

    pub fn current_display(&self) -> Option<DisplayId> {
        self.display
    }

    pub fn headtracking(&self) -> &TrackingTarget {
        &self.headtracking
    }

    pub fn eye_distance(&self) -> f64 {
        self.eye_distance
    }

    pub fn activity_zone(&self) -> Option<&ActivityZone> {
        self.activity_zone.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct UserRegistry {
    users: Vec<User>,
    next_id: u32,
    total_glasses: u32,
}

impl UserRegistry {
    /// Registry for a setup with glasses `1..=total_glasses`.
    pub fn new(total_glasses: u32) -> Self {
        Self {
            total_glasses,
            ..Self::default()
        }
    }

    pub fn total_glasses(&self) -> u32 {
        self.total_glasses
    }

    fn check_glasses(&self, glasses: Option<GlassesId>) -> Result<(), HyperError> {
        match glasses {
            Some(GlassesId(0)) => Err(HyperError::config("glasses ids start at 1")),
            Some(GlassesId(g)) if g > self.total_glasses => Err(HyperError::config(format!(
                "glasses id {g} exceeds the {} available glasses",
                self.total_glasses
            ))),
            _ => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Returns [`HyperError::Config`] when the glasses id is 0 or larger than
    /// the number of glasses.
    pub fn register(&mut self, descriptor: UserDescriptor) -> Result<UserId, HyperError> {
        self.check_glasses(descriptor.glasses)?;
        let id = UserId(self.next_id);
        self.next_id += 1;
        debug!(user = %id, name = %descriptor.name, vip = descriptor.vip, "user registered");
        self.users.push(User {
            id,
            name: descriptor.name,
            vip: descriptor.vip,
            active: descriptor.active,
            glasses: descriptor.glasses,
            display: descriptor.display,
            headtracking: descriptor.headtracking,
            eye_distance: descriptor.eye_distance,
            activity_zone: descriptor.activity_zone,
        });
        Ok(id)
    }

    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn get_mut(&mut self, id: UserId) -> Result<&mut User, HyperError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| HyperError::config(format!("unknown {id}")))
    }

    /// Users in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.iter()
    }

    pub fn on_display(&self, display: DisplayId) -> impl Iterator<Item = &User> {
        self.users.iter().filter(move |u| u.display == Some(display))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn set_active(&mut self, id: UserId, active: bool) -> Result<bool, HyperError> {
        let user = self.get_mut(id)?;
        let changed = user.active != active;
        user.active = active;
        Ok(changed)
    }

    pub fn set_vip(&mut self, id: UserId, vip: bool) -> Result<bool, HyperError> {
        let user = self.get_mut(id)?;
        let changed = user.vip != vip;
        user.vip = vip;
        Ok(changed)
    }

    pub fn set_display(&mut self, id: UserId, display: Option<DisplayId>) -> Result<bool, HyperError> {
        let user = self.get_mut(id)?;
        let changed = user.display != display;
        user.display = display;
        Ok(changed)
    }

    pub fn set_glasses(&mut self, id: UserId, glasses: Option<GlassesId>) -> Result<bool, HyperError> {
        self.check_glasses(glasses)?;
        let user = self.get_mut(id)?;
        let changed = user.glasses != glasses;
        user.glasses = glasses;
        Ok(changed)
    }

    /// Re-evaluate the activity of every user with an activity zone from the
    /// head position.  Returns `true` when any user changed.
    pub fn update_activity(&mut self, tracking: &dyn TrackingService) -> bool {
        let mut changed = false;
        for user in &mut self.users {
            let Some(zone) = user.activity_zone else {
                continue;
            };
            let head = user.headtracking.resolve(tracking).w_axis.truncate();
            let active = !zone.contains(head);
            if active != user.active {
                debug!(user = %user.id, active, "user activity changed");
                user.active = active;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperspace_hal::sim::StaticTracking;

    #[test]
    fn ids_in_registration_order() {
        let mut reg = UserRegistry::new(6);
        let a = reg.register(UserDescriptor::new("a")).unwrap();
        let b = reg.register(UserDescriptor::new("b").vip(true)).unwrap();
        assert_eq!((a, b), (UserId(0), UserId(1)));
        assert!(reg.get(b).unwrap().is_vip());
        assert_eq!(reg.get(a).unwrap().eye_distance(), 0.065);
    }

    #[test]
    fn glasses_range_checked() {
        let mut reg = UserRegistry::new(6);
        assert!(reg.register(UserDescriptor::new("a").glasses(GlassesId(6))).is_ok());
        assert!(matches!(
            reg.register(UserDescriptor::new("b").glasses(GlassesId(7))),
            Err(HyperError::Config { .. })
        ));
        assert!(reg.register(UserDescriptor::new("c").glasses(GlassesId(0))).is_err());
        assert_eq!(reg.len(), 1);
        assert!(reg.set_glasses(UserId(0), Some(GlassesId(9))).is_err());
    }

    #[test]
    fn setters_report_changes() {
        let mut reg = UserRegistry::new(6);
        let id = reg.register(UserDescriptor::new("a")).unwrap();
        assert!(!reg.set_active(id, true).unwrap());
        assert!(reg.set_active(id, false).unwrap());
        assert!(reg.set_display(id, Some(DisplayId(1))).unwrap());
        assert_eq!(reg.on_display(DisplayId(1)).count(), 1);
        assert!(reg.set_vip(UserId(42), true).is_err());
    }

    #[test]
    fn glasses_on_table_deactivate_user() {
        let tracking = StaticTracking::new();
        let mut reg = UserRegistry::new(6);
        let id = reg
            .register(
                UserDescriptor::new("a")
                    .tracked_by(TrackingTarget::new("tracking-dlp-glasses-6", DMat4::IDENTITY))
                    .activity_zone(ActivityZone::glasses_table()),
            )
            .unwrap();
        let untracked = reg.register(UserDescriptor::new("b").active(false)).unwrap();

        tracking.set("tracking-dlp-glasses-6", DMat4::from_translation(DVec3::new(-2.0, 1.0, 0.5)));
        assert!(reg.update_activity(&tracking));
        assert!(!reg.get(id).unwrap().is_active());
        assert!(!reg.update_activity(&tracking));

        tracking.set("tracking-dlp-glasses-6", DMat4::from_translation(DVec3::new(0.0, 1.7, 1.0)));
        assert!(reg.update_activity(&tracking));
        assert!(reg.get(id).unwrap().is_active());
        // Users without a zone keep their explicit state.
        assert!(!reg.get(untracked).unwrap().is_active());
    }
}
