use crate::geo::GeoPoint;
use crate::map::camera::CameraState;
use crate::map::overlay::{OverlayDiff, OverlaySet};

/// The rendering backend behind the map surface.
///
/// Only [`MapSurface`](crate::map::MapSurface) holds an engine; other
/// components reach it through the surface.
pub trait MapEngine {
    fn pan_to(&mut self, center: GeoPoint);

    fn apply_camera(&mut self, camera: &CameraState);

    /// `overlays` is the full current set; `diff` names what moved since the
    /// last call.
    fn apply_overlays(&mut self, overlays: &OverlaySet, diff: &OverlayDiff);

    fn release(&mut self);
}

/// Camera-change notification raised by the engine.
///
/// The first one carries the engine instance itself; `center` is set when the
/// user panned the view.
#[derive(Debug)]
pub struct CameraChange<E> {
    pub engine: Option<E>,
    pub center: Option<GeoPoint>,
}

impl<E> CameraChange<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine: Some(engine),
            center: None,
        }
    }

    pub fn panned(center: GeoPoint) -> Self {
        Self {
            engine: None,
            center: Some(center),
        }
    }
}
