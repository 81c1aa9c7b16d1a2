//! Portals and transit detection.
//!
//! A portal is a rectangle in world space (the entry) paired with an exit
//! frame and scale.  Each frame the [`PortalTransitDetector`] looks at the
//! tracked device of every navigation that reacts on portal transits: when the
//! device sits just behind the entry plane (local `z < 0`) while a point one
//! unit further along the device's forward axis is already in front of it
//! (local `z >= 0`), and the device is inside the rectangle, the navigation is
//! carried over to the exit frame.
//!
//! Overlapping portals resolve in declaration order; only the first match
//! fires in a frame.

use glam::{DMat4, DVec3};
use hyperspace_types::{HyperError, PortalId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::math::{rotation_of, translation_of};
use crate::steering::NavigationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewingMode {
    #[serde(rename = "2D")]
    TwoD,
    #[default]
    #[serde(rename = "3D")]
    ThreeD,
}

impl ViewingMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewingMode::TwoD => ViewingMode::ThreeD,
            ViewingMode::ThreeD => ViewingMode::TwoD,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portal {
    pub id: PortalId,
    /// Centre of the entry rectangle; local Z is the crossing direction.
    pub entry: DMat4,
    pub width: f64,
    pub height: f64,
    pub exit_transform: DMat4,
    pub exit_scale: f64,
    pub viewing_mode: ViewingMode,
    pub transit_enabled: bool,
}

impl Portal {
    /// Whether the device matrix `device` (world space, scaled) is crossing
    /// this portal right now.
    pub fn is_crossed_by(&self, device: &DMat4) -> bool {
        if !self.transit_enabled || self.viewing_mode != ViewingMode::ThreeD {
            return false;
        }
        let to_local = self.entry.inverse();
        let position = to_local.transform_point3(translation_of(device));
        let ahead = to_local.transform_point3(device.transform_point3(DVec3::Z));

        position.x.abs() < self.width / 2.0
            && position.y.abs() < self.height / 2.0
            && position.z < 0.0
            && ahead.z >= 0.0
    }

    /// Navigation matrix that puts the device at the corresponding spot
    /// behind the exit, given the device offset `station` relative to the
    /// navigation frame.
    pub fn exit_navigation_transform(&self, device: &DMat4, station: DVec3) -> DMat4 {
        let local = self.entry.inverse() * *device;
        let exit_scale = DMat4::from_scale(DVec3::splat(self.exit_scale));
        self.exit_transform
            * exit_scale
            * DMat4::from_translation(translation_of(&local))
            * DMat4::from_quat(rotation_of(&local))
            * DMat4::from_translation(-station)
            * exit_scale.inverse()
    }
}

/// Owns the portals of one scene in declaration order.
#[derive(Debug, Default)]
pub struct PortalTransitDetector {
    portals: Vec<Portal>,
    next_id: u32,
}

impl PortalTransitDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a portal and return its id.
    pub fn add_portal(
        &mut self,
        entry: DMat4,
        width: f64,
        height: f64,
        exit_transform: DMat4,
        exit_scale: f64,
        transit_enabled: bool,
    ) -> PortalId {
        let id = PortalId(self.next_id);
        self.next_id += 1;
        self.portals.push(Portal {
            id,
            entry,
            width,
            height,
            exit_transform,
            exit_scale,
            viewing_mode: ViewingMode::ThreeD,
            transit_enabled,
        });
        debug!(portal = %id, width, height, "portal added");
        id
    }

    /// Connect two places in both directions.
    ///
    /// Stepping through `second` lands at `first`; the mirrored portal (both
    /// frames turned 180° about Y) leads from `first` back to `second`.
    pub fn add_bidirectional_portal(&mut self, first: DMat4, second: DMat4, width: f64, height: f64) -> (PortalId, PortalId) {
        let turn = DMat4::from_rotation_y(std::f64::consts::PI);
        let forward = self.add_portal(second, width, height, first, 1.0, true);
        let backward = self.add_portal(first * turn, width, height, second * turn, 1.0, true);
        (forward, backward)
    }

    /// # Errors
    ///
    /// Returns [`HyperError::UnknownPortal`] when no portal has this id.
    pub fn remove_portal(&mut self, id: PortalId) -> Result<(), HyperError> {
        let index = self.index_of(id)?;
        self.portals.remove(index);
        debug!(portal = %id, "portal removed");
        Ok(())
    }

    pub fn portal(&self, id: PortalId) -> Option<&Portal> {
        self.portals.iter().find(|p| p.id == id)
    }

    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    pub fn len(&self) -> usize {
        self.portals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    fn index_of(&self, id: PortalId) -> Result<usize, HyperError> {
        self.portals
            .iter()
            .position(|p| p.id == id)
            .ok_or(HyperError::UnknownPortal(id))
    }

    fn portal_mut(&mut self, id: PortalId) -> Result<&mut Portal, HyperError> {
        let index = self.index_of(id)?;
        Ok(&mut self.portals[index])
    }

    /// Toggle between the flat and the stereoscopic presentation.  Returns
    /// the new mode.
    pub fn switch_viewing_mode(&mut self, id: PortalId) -> Result<ViewingMode, HyperError> {
        let portal = self.portal_mut(id)?;
        portal.viewing_mode = portal.viewing_mode.toggled();
        Ok(portal.viewing_mode)
    }

    pub fn set_entry(&mut self, id: PortalId, entry: DMat4) -> Result<(), HyperError> {
        self.portal_mut(id)?.entry = entry;
        Ok(())
    }

    pub fn set_exit_transform(&mut self, id: PortalId, exit_transform: DMat4) -> Result<(), HyperError> {
        self.portal_mut(id)?.exit_transform = exit_transform;
        Ok(())
    }

    pub fn set_exit_scale(&mut self, id: PortalId, exit_scale: f64) -> Result<(), HyperError> {
        self.portal_mut(id)?.exit_scale = exit_scale;
        Ok(())
    }

    pub fn set_size(&mut self, id: PortalId, width: f64, height: f64) -> Result<(), HyperError> {
        let portal = self.portal_mut(id)?;
        portal.width = width;
        portal.height = height;
        Ok(())
    }

    pub fn set_transit_enabled(&mut self, id: PortalId, enabled: bool) -> Result<(), HyperError> {
        self.portal_mut(id)?.transit_enabled = enabled;
        Ok(())
    }

    /// Teleport `nav` through the first portal it is crossing.
    ///
    /// The navigation's transform is overwritten, its scale set to the exit
    /// scale (ending any scale stop) and its trace restarted.
    pub fn check(&self, nav: &mut NavigationState) -> Option<PortalId> {
        if !nav.reacts_on_portal_transit() {
            return None;
        }
        let station = translation_of(&nav.reference());
        let device = nav.world_transform() * DMat4::from_translation(station);

        let portal = self.portals.iter().find(|p| p.is_crossed_by(&device))?;
        nav.set_transform(portal.exit_navigation_transform(&device, station));
        nav.set_scale(portal.exit_scale);
        nav.clear_trace();
        info!(navigation = %nav.id(), portal = %portal.id, "portal transit");
        Some(portal.id)
    }

    /// Run [`check`](Self::check) for every navigation.
    pub fn check_all(&self, navs: &mut [NavigationState]) -> Vec<(usize, PortalId)> {
        navs.iter_mut()
            .enumerate()
            .filter_map(|(index, nav)| self.check(nav).map(|id| (index, id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steering::NavigationConfig;
    use crate::trace::TraceSettings;
    use hyperspace_types::NavigationId;

    fn reacting_nav(z: f64, scale: f64) -> NavigationState {
        NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                start_transform: DMat4::from_translation(DVec3::new(0.0, 0.0, z)),
                start_scale: scale,
                reacts_on_portal_transit: true,
                trace: Some(TraceSettings::default()),
                ..NavigationConfig::default()
            },
        )
        .unwrap()
    }

    fn origin_portal(exit: DMat4) -> (PortalTransitDetector, PortalId) {
        let mut detector = PortalTransitDetector::new();
        let id = detector.add_portal(DMat4::IDENTITY, 2.0, 2.0, exit, 1.0, true);
        (detector, id)
    }

    #[test]
    fn fires_when_device_straddles_the_plane() {
        let exit = DMat4::from_translation(DVec3::new(100.0, 0.0, 0.0));
        let (detector, id) = origin_portal(exit);
        let mut nav = reacting_nav(-0.05, 0.1);
        assert_eq!(detector.check(&mut nav), Some(id));
        assert_eq!(nav.scale(), 1.0);
        // Carried over to the exit with the local offset preserved.
        assert!((nav.translation() - DVec3::new(100.0, 0.0, -0.05)).length() < 1e-9);
        assert_eq!(detector.check(&mut nav), None);
    }

    #[test]
    fn same_side_never_fires() {
        let (detector, _) = origin_portal(DMat4::IDENTITY);
        let mut nav = reacting_nav(0.05, 0.1);
        for _ in 0..5 {
            assert_eq!(detector.check(&mut nav), None);
        }
    }

    #[test]
    fn outside_rectangle_does_not_fire() {
        let (detector, _) = origin_portal(DMat4::IDENTITY);
        let mut nav = NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                start_transform: DMat4::from_translation(DVec3::new(1.5, 0.0, -0.05)),
                start_scale: 0.1,
                reacts_on_portal_transit: true,
                ..NavigationConfig::default()
            },
        )
        .unwrap();
        assert_eq!(detector.check(&mut nav), None);
    }

    #[test]
    fn non_reacting_navigation_is_ignored() {
        let (detector, _) = origin_portal(DMat4::IDENTITY);
        let mut nav = NavigationState::new(
            NavigationId(0),
            NavigationConfig {
                start_transform: DMat4::from_translation(DVec3::new(0.0, 0.0, -0.05)),
                start_scale: 0.1,
                ..NavigationConfig::default()
            },
        )
        .unwrap();
        assert_eq!(detector.check(&mut nav), None);
    }

    #[test]
    fn disabled_or_flat_portals_do_not_fire() {
        let (mut detector, id) = origin_portal(DMat4::IDENTITY);
        detector.set_transit_enabled(id, false).unwrap();
        assert_eq!(detector.check(&mut reacting_nav(-0.05, 0.1)), None);

        detector.set_transit_enabled(id, true).unwrap();
        assert_eq!(detector.switch_viewing_mode(id).unwrap(), ViewingMode::TwoD);
        assert_eq!(detector.check(&mut reacting_nav(-0.05, 0.1)), None);
    }

    #[test]
    fn first_declared_portal_wins() {
        let mut detector = PortalTransitDetector::new();
        let first = detector.add_portal(DMat4::IDENTITY, 2.0, 2.0, DMat4::from_translation(DVec3::X * 10.0), 1.0, true);
        let _second = detector.add_portal(DMat4::IDENTITY, 2.0, 2.0, DMat4::from_translation(DVec3::X * 20.0), 1.0, true);
        let mut nav = reacting_nav(-0.05, 0.1);
        assert_eq!(detector.check(&mut nav), Some(first));
        assert!((nav.translation().x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn transit_applies_exit_scale_and_restarts_trace() {
        let mut detector = PortalTransitDetector::new();
        detector.add_portal(DMat4::IDENTITY, 2.0, 2.0, DMat4::IDENTITY, 0.5, true);
        let mut nav = reacting_nav(-0.05, 0.1);
        detector.check(&mut nav).unwrap();
        assert_eq!(nav.scale(), 0.5);
        assert!(nav.scale_stop().is_none());
        assert_eq!(nav.trace().unwrap().len(), 1);
    }

    #[test]
    fn bidirectional_portal_registers_mirror() {
        let first = DMat4::from_translation(DVec3::new(0.0, 1.3, 0.0));
        let second = DMat4::from_translation(DVec3::new(-23.0, 1.3, 21.0)) * DMat4::from_rotation_y(90f64.to_radians());
        let mut detector = PortalTransitDetector::new();
        let (forward, backward) = detector.add_bidirectional_portal(first, second, 4.0, 2.6);
        assert_eq!(detector.len(), 2);
        assert_eq!(detector.portal(forward).unwrap().entry, second);
        assert_eq!(detector.portal(forward).unwrap().exit_transform, first);
        let mirror = detector.portal(backward).unwrap();
        let turned = first * DMat4::from_rotation_y(std::f64::consts::PI);
        assert!(mirror.entry.abs_diff_eq(turned, 1e-12));
    }

    #[test]
    fn reposition_and_remove() {
        let (mut detector, id) = origin_portal(DMat4::IDENTITY);
        detector.set_size(id, 4.0, 2.6).unwrap();
        detector.set_exit_scale(id, 2.0).unwrap();
        let moved = DMat4::from_translation(DVec3::new(0.0, 0.0, 5.0));
        detector.set_entry(id, moved).unwrap();
        detector.set_exit_transform(id, moved).unwrap();
        let portal = detector.portal(id).unwrap();
        assert_eq!((portal.width, portal.height, portal.exit_scale), (4.0, 2.6, 2.0));
        assert_eq!(portal.entry, moved);

        detector.remove_portal(id).unwrap();
        assert!(detector.is_empty());
        assert_eq!(detector.remove_portal(id), Err(HyperError::UnknownPortal(id)));
    }

    #[test]
    fn check_all_reports_moved_navigations() {
        let (detector, id) = origin_portal(DMat4::from_translation(DVec3::X * 100.0));
        let mut navs = vec![reacting_nav(0.05, 0.1), reacting_nav(-0.05, 0.1)];
        assert_eq!(detector.check_all(&mut navs), vec![(1, id)]);
    }
}
