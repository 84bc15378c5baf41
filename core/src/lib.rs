//! Live tracking, cross-surface state bridging and map composition for the
//! sensor dashboard.
//!
//! The modules follow the data flow: a position stream feeds a bounded path,
//! search results arrive through the bridge, and the map surface reconciles
//! both into overlays on a single captured engine.

pub mod bridge;
pub mod geo;
pub mod map;
pub mod prelude;
pub mod query;
pub mod session;
pub mod task;
pub mod telemetry;
pub mod tracking;

pub use prelude::{DashboardError, DashboardResult};
pub use session::{DashboardSession, SessionConfig, SessionSummary};
