use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};

pub const TILT_RANGE: (f64, f64) = (0.0, 67.0);
/// Whole-degree steps, so 359 is the last heading below a full turn.
pub const HEADING_RANGE: (f64, f64) = (0.0, 359.0);
pub const ZOOM_RANGE: (f64, f64) = (10.0, 22.0);

/// Camera over the map.
///
/// Out-of-range tilt, heading and zoom are clamped to the nearest bound;
/// non-finite input is ignored. All three setters follow that one policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub center: Option<GeoPoint>,
    tilt: f64,
    heading: f64,
    zoom: f64,
    pub follow_target: bool,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            center: None,
            tilt: 0.0,
            heading: 0.0,
            zoom: 15.0,
            follow_target: true,
        }
    }
}

/// A single user-driven camera change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraAdjustment {
    Tilt(f64),
    Heading(f64),
    Zoom(f64),
    Follow(bool),
    ToggleFollow,
}

fn clamp_into(current: f64, value: f64, (min, max): (f64, f64)) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        current
    }
}

impl CameraState {
    pub fn new(tilt: f64, heading: f64, zoom: f64, follow_target: bool) -> Self {
        let mut camera = Self {
            follow_target,
            ..Self::default()
        };
        camera.set_tilt(tilt);
        camera.set_heading(heading);
        camera.set_zoom(zoom);
        camera
    }

    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_tilt(&mut self, value: f64) {
        self.tilt = clamp_into(self.tilt, value, TILT_RANGE);
    }

    pub fn set_heading(&mut self, value: f64) {
        self.heading = clamp_into(self.heading, value, HEADING_RANGE);
    }

    pub fn set_zoom(&mut self, value: f64) {
        self.zoom = clamp_into(self.zoom, value, ZOOM_RANGE);
    }

    pub fn apply(&mut self, adjustment: CameraAdjustment) {
        match adjustment {
            CameraAdjustment::Tilt(value) => self.set_tilt(value),
            CameraAdjustment::Heading(value) => self.set_heading(value),
            CameraAdjustment::Zoom(value) => self.set_zoom(value),
            CameraAdjustment::Follow(on) => self.follow_target = on,
            CameraAdjustment::ToggleFollow => self.follow_target = !self.follow_target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Tilt,
    Heading,
    Zoom,
}

/// One slider of the camera panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRow {
    pub kind: ControlKind,
    pub label: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: f64,
}

impl ControlRow {
    pub fn adjustment(&self, value: f64) -> CameraAdjustment {
        match self.kind {
            ControlKind::Tilt => CameraAdjustment::Tilt(value),
            ControlKind::Heading => CameraAdjustment::Heading(value),
            ControlKind::Zoom => CameraAdjustment::Zoom(value),
        }
    }
}

/// Bounded controls for the camera. Collapsing only hides the rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CameraControlPanel {
    collapsed: bool,
}

impl CameraControlPanel {
    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn toggle_collapsed(&mut self) {
        self.collapsed = !self.collapsed;
    }

    pub fn rows(&self, camera: &CameraState) -> Vec<ControlRow> {
        if self.collapsed {
            return Vec::new();
        }
        vec![
            ControlRow {
                kind: ControlKind::Tilt,
                label: "Tilt",
                unit: "°",
                min: TILT_RANGE.0,
                max: TILT_RANGE.1,
                step: 1.0,
                value: camera.tilt(),
            },
            ControlRow {
                kind: ControlKind::Heading,
                label: "Heading",
                unit: "°",
                min: HEADING_RANGE.0,
                max: HEADING_RANGE.1,
                step: 1.0,
                value: camera.heading(),
            },
            ControlRow {
                kind: ControlKind::Zoom,
                label: "Zoom",
                unit: "",
                min: ZOOM_RANGE.0,
                max: ZOOM_RANGE.1,
                step: 1.0,
                value: camera.zoom(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_above_range_clamps_to_max() {
        let mut camera = CameraState::default();
        camera.apply(CameraAdjustment::Zoom(30.0));
        assert_eq!(camera.zoom(), 22.0);
        camera.apply(CameraAdjustment::Zoom(3.0));
        assert_eq!(camera.zoom(), 10.0);
    }

    #[test]
    fn tilt_and_heading_follow_the_same_policy() {
        let mut camera = CameraState::default();
        camera.apply(CameraAdjustment::Tilt(90.0));
        camera.apply(CameraAdjustment::Heading(-15.0));
        assert_eq!(camera.tilt(), 67.0);
        assert_eq!(camera.heading(), 0.0);
        camera.apply(CameraAdjustment::Heading(720.0));
        assert_eq!(camera.heading(), 359.0);
    }

    #[test]
    fn non_finite_input_is_ignored() {
        let mut camera = CameraState::new(10.0, 20.0, 12.0, false);
        camera.apply(CameraAdjustment::Tilt(f64::NAN));
        camera.apply(CameraAdjustment::Zoom(f64::INFINITY));
        assert_eq!(camera.tilt(), 10.0);
        assert_eq!(camera.zoom(), 12.0);
    }

    #[test]
    fn constructor_clamps_too() {
        let camera = CameraState::new(100.0, 400.0, 1.0, true);
        assert_eq!((camera.tilt(), camera.heading(), camera.zoom()), (67.0, 359.0, 10.0));
    }

    #[test]
    fn follow_toggle() {
        let mut camera = CameraState::default();
        assert!(camera.follow_target);
        camera.apply(CameraAdjustment::ToggleFollow);
        assert!(!camera.follow_target);
        camera.apply(CameraAdjustment::Follow(true));
        assert!(camera.follow_target);
    }

    #[test]
    fn collapsed_panel_hides_rows_without_touching_camera() {
        let camera = CameraState::default();
        let mut panel = CameraControlPanel::default();
        assert_eq!(panel.rows(&camera).len(), 3);
        panel.toggle_collapsed();
        assert!(panel.rows(&camera).is_empty());
        assert_eq!(camera, CameraState::default());
    }

    #[test]
    fn rows_map_back_to_adjustments() {
        let camera = CameraState::default();
        let rows = CameraControlPanel::default().rows(&camera);
        assert_eq!(rows[2].adjustment(18.0), CameraAdjustment::Zoom(18.0));
        assert_eq!(rows[0].max, 67.0);
    }
}
