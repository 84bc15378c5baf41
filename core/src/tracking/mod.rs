pub mod path;
pub mod position;
pub mod stream;

pub use path::{Path, PathAccumulator, DEFAULT_PATH_CAPACITY};
pub use position::{now_millis, Position};
pub use stream::{spawn_emitter, PositionSource, RandomWalk, TrackingUpdate};
