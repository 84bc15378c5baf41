pub mod camera;
pub mod engine;
pub mod nodes;
pub mod overlay;
pub mod surface;

pub use camera::{CameraAdjustment, CameraControlPanel, CameraState, ControlKind, ControlRow};
pub use engine::{CameraChange, MapEngine};
pub use nodes::{lantern_nodes, load_nodes, StaticNode};
pub use overlay::{
    CoordinateFallback, Overlay, OverlayDiff, OverlayInputs, OverlayKey, OverlaySet, PathLayer,
    UnplacedDetection,
};
pub use surface::{MapAvailability, MapSurface};
