//! Typed view of the detection backend and the search orchestration that
//! sits in front of it.

pub mod client;
pub mod detection;
pub mod filters;
pub mod network;
pub mod search;

pub use client::DetectionQuery;
pub use detection::{
    Detection, DetectionResponse, DetectionsResponse, HighlightSet, HighlightedNode,
    LatestResponse,
};
pub use filters::{DescriptionQuery, RangeFilter, TimeWindow};
pub use network::{GraphResponse, NetworkResponse, VehicleGroup};
pub use search::{execute_plan, SearchPlan, TireIds, VehicleSearch};
