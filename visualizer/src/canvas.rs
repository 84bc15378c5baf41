use iced::{
    mouse,
    widget::canvas::{self, Frame, Geometry, Path, Stroke, Text},
    Color, Point, Rectangle, Renderer, Theme,
};
use trackcore::geo::{metres_per_pixel, project, GeoPoint};
use trackcore::map::{CameraState, MapEngine, Overlay, OverlayDiff, OverlaySet};

/// What the canvas engine was last told to show.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub center: Option<GeoPoint>,
    pub camera: CameraState,
    pub overlays: OverlaySet,
}

/// Map engine that keeps a drawable scene for [`MapCanvas`].
#[derive(Debug, Default)]
pub struct CanvasEngine {
    scene: Scene,
    released: bool,
}

impl CanvasEngine {
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl MapEngine for CanvasEngine {
    fn pan_to(&mut self, center: GeoPoint) {
        self.scene.center = Some(center);
    }

    fn apply_camera(&mut self, camera: &CameraState) {
        self.scene.camera = *camera;
        if camera.center.is_some() {
            self.scene.center = camera.center;
        }
    }

    fn apply_overlays(&mut self, overlays: &OverlaySet, diff: &OverlayDiff) {
        log::debug!(
            "canvas overlays +{} -{} ~{}",
            diff.added.len(),
            diff.removed.len(),
            diff.changed.len()
        );
        self.scene.overlays = overlays.clone();
    }

    fn release(&mut self) {
        self.released = true;
        self.scene.overlays = OverlaySet::default();
    }
}

/// Screen placement for one frame: Web-Mercator around the centre, rotated
/// by heading and squashed vertically by tilt.
#[derive(Debug, Clone, Copy)]
pub struct ScreenProjection {
    center_world: (f64, f64),
    center_lat: f64,
    zoom: f64,
    heading: f64,
    foreshorten: f64,
    origin: (f64, f64),
}

impl ScreenProjection {
    pub fn new(center: GeoPoint, camera: &CameraState, width: f32, height: f32) -> Self {
        Self {
            center_world: project(center, camera.zoom()),
            center_lat: center.latitude,
            zoom: camera.zoom(),
            heading: camera.heading().to_radians(),
            foreshorten: camera.tilt().to_radians().cos(),
            origin: (f64::from(width) / 2.0, f64::from(height) / 2.0),
        }
    }

    pub fn to_screen(&self, point: GeoPoint) -> Point {
        let (x, y) = project(point, self.zoom);
        let dx = x - self.center_world.0;
        let dy = y - self.center_world.1;
        let (sin, cos) = self.heading.sin_cos();
        let rx = dx * cos + dy * sin;
        let ry = (-dx * sin + dy * cos) * self.foreshorten;
        Point::new((self.origin.0 + rx) as f32, (self.origin.1 + ry) as f32)
    }

    pub fn metres_to_pixels(&self, metres: f64) -> f32 {
        (metres / metres_per_pixel(self.center_lat, self.zoom)) as f32
    }
}

fn rgba([r, g, b, a]: [u8; 4]) -> Color {
    Color::from_rgba8(r, g, b, f32::from(a) / 255.0)
}

fn polyline(projection: &ScreenProjection, vertices: &[GeoPoint]) -> Option<Path> {
    if vertices.len() < 2 {
        return None;
    }
    Some(Path::new(|builder| {
        for (i, vertex) in vertices.iter().enumerate() {
            let point = projection.to_screen(*vertex);
            if i == 0 {
                builder.move_to(point);
            } else {
                builder.line_to(point);
            }
        }
    }))
}

/// Draws a [`Scene`].
pub struct MapCanvas<'a> {
    pub scene: &'a Scene,
}

impl<'a, Message> canvas::Program<Message> for MapCanvas<'a> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.06, 0.07, 0.09),
        );

        let Some(center) = self.scene.center else {
            frame.fill_text(Text {
                content: "Waiting for the first position...".into(),
                position: Point::new(12.0, 12.0),
                color: Color::from_rgb(0.7, 0.7, 0.7),
                ..Text::default()
            });
            return vec![frame.into_geometry()];
        };
        let projection =
            ScreenProjection::new(center, &self.scene.camera, bounds.width, bounds.height);

        // Areas first, then lines, then markers on top.
        for (_, overlay) in self.scene.overlays.iter() {
            match overlay {
                Overlay::RangeCircle { center, radius_km } => {
                    let radius = projection.metres_to_pixels(radius_km * 1000.0);
                    let circle =
                        Path::new(|b| b.circle(projection.to_screen(*center), radius));
                    frame.fill(&circle, Color::from_rgba(0.2, 0.5, 0.9, 0.12));
                    frame.stroke(
                        &circle,
                        Stroke::default()
                            .with_width(1.5)
                            .with_color(Color::from_rgb(0.3, 0.55, 0.95)),
                    );
                }
                Overlay::HighlightRing {
                    center, radius_m, ..
                } => {
                    let radius = projection.metres_to_pixels(*radius_m).max(4.0);
                    let ring = Path::new(|b| b.circle(projection.to_screen(*center), radius));
                    frame.stroke(
                        &ring,
                        Stroke::default()
                            .with_width(2.0)
                            .with_color(Color::from_rgb(1.0, 0.8, 0.1)),
                    );
                }
                _ => {}
            }
        }

        for (_, overlay) in self.scene.overlays.iter() {
            match overlay {
                Overlay::PathLine(layer) => {
                    if let Some(path) = polyline(&projection, &layer.vertices) {
                        frame.stroke(
                            &path,
                            Stroke::default()
                                .with_width(layer.width_px)
                                .with_color(rgba(layer.color)),
                        );
                    }
                }
                Overlay::NetworkRoute { vertices } => {
                    if let Some(path) = polyline(&projection, vertices) {
                        frame.stroke(
                            &path,
                            Stroke::default()
                                .with_width(3.0)
                                .with_color(Color::from_rgba(0.2, 0.9, 0.6, 0.8)),
                        );
                    }
                }
                _ => {}
            }
        }

        for (_, overlay) in self.scene.overlays.iter() {
            match overlay {
                Overlay::NodeMarker { position, .. } => {
                    let dot = Path::new(|b| b.circle(projection.to_screen(*position), 3.0));
                    frame.fill(&dot, Color::from_rgb(0.55, 0.6, 0.7));
                }
                Overlay::ResultMarker {
                    label,
                    position,
                    approximate,
                } => {
                    let at = projection.to_screen(*position);
                    let marker = Path::new(|b| b.circle(at, 6.0));
                    let color = Color::from_rgb(0.95, 0.55, 0.2);
                    if *approximate {
                        frame.stroke(&marker, Stroke::default().with_width(2.0).with_color(color));
                    } else {
                        frame.fill(&marker, color);
                    }
                    frame.fill_text(Text {
                        content: label.clone(),
                        position: Point::new(at.x + 8.0, at.y - 6.0),
                        color: Color::from_rgb(0.9, 0.9, 0.9),
                        size: 11.0.into(),
                        ..Text::default()
                    });
                }
                Overlay::TrackedMarker { position } => {
                    let marker = Path::new(|b| b.circle(projection.to_screen(*position), 7.0));
                    frame.fill(&marker, Color::from_rgb(0.9, 0.15, 0.15));
                    frame.stroke(
                        &marker,
                        Stroke::default().with_width(2.0).with_color(Color::WHITE),
                    );
                }
                _ => {}
            }
        }

        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trackcore::map::{CameraChange, MapSurface, OverlayKey, StaticNode};
    use trackcore::prelude::MapConfig;
    use trackcore::tracking::{Path, Position, TrackingUpdate};

    const CENTER: GeoPoint = GeoPoint {
        latitude: 42.3601,
        longitude: -71.0589,
    };

    fn camera(tilt: f64, heading: f64) -> CameraState {
        CameraState::new(tilt, heading, 16.0, true)
    }

    #[test]
    fn centre_lands_in_the_middle() {
        let projection = ScreenProjection::new(CENTER, &camera(45.0, 90.0), 400.0, 300.0);
        let p = projection.to_screen(CENTER);
        assert!((p.x - 200.0).abs() < 1e-3);
        assert!((p.y - 150.0).abs() < 1e-3);
    }

    #[test]
    fn north_is_up_without_heading() {
        let projection = ScreenProjection::new(CENTER, &camera(0.0, 0.0), 400.0, 300.0);
        let north = projection.to_screen(GeoPoint::new(CENTER.latitude + 0.001, CENTER.longitude));
        assert!(north.y < 150.0);
        assert!((north.x - 200.0).abs() < 1e-3);
    }

    #[test]
    fn heading_rotates_the_map() {
        let projection = ScreenProjection::new(CENTER, &camera(0.0, 90.0), 400.0, 300.0);
        // Facing east, north ends up on the left.
        let north = projection.to_screen(GeoPoint::new(CENTER.latitude + 0.001, CENTER.longitude));
        assert!(north.x < 200.0);
        assert!((north.y - 150.0).abs() < 1e-2);
    }

    #[test]
    fn tilt_foreshortens_vertical_distance() {
        let north = GeoPoint::new(CENTER.latitude + 0.001, CENTER.longitude);
        let flat = ScreenProjection::new(CENTER, &camera(0.0, 0.0), 400.0, 300.0).to_screen(north);
        let tilted =
            ScreenProjection::new(CENTER, &camera(60.0, 0.0), 400.0, 300.0).to_screen(north);
        let flat_dy = 150.0 - flat.y;
        let tilted_dy = 150.0 - tilted.y;
        assert!((tilted_dy - flat_dy * 0.5).abs() < 0.05);
    }

    #[test]
    fn surface_drives_the_canvas_scene() {
        let nodes = Arc::new(vec![StaticNode::new("Lantern 1", 42.36, -71.06)]);
        let mut surface: MapSurface<CanvasEngine> = MapSurface::new(nodes, MapConfig::default());
        surface.on_camera_change(CameraChange::with_engine(CanvasEngine::default()));

        let position = Position::at(CENTER, 1);
        let path = Path::with_capacity(4).unwrap().append(position);
        surface.on_tracking_update(&TrackingUpdate { position, path });

        let scene = surface.engine().unwrap().scene();
        assert_eq!(scene.center, Some(CENTER));
        assert!(scene.overlays.contains(&OverlayKey::Tracked));
        assert!(scene.overlays.contains(&OverlayKey::Path));
        assert!(scene.overlays.contains(&OverlayKey::Node("Lantern 1".into())));

        let engine = surface.release().unwrap();
        assert!(engine.is_released());
        assert!(engine.scene().overlays.is_empty());
    }
}
