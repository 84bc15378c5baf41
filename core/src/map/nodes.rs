use crate::geo::GeoPoint;
use crate::prelude::DashboardResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fixed infrastructure sensor shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticNode {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl StaticNode {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Reads a JSON array of nodes, e.g. an exported deployment plan.
pub fn load_nodes<P: AsRef<Path>>(path: P) -> DashboardResult<Vec<StaticNode>> {
    let contents = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&contents)?)
}

const LANTERN_DEPLOYMENT: &[(f64, f64)] = &[
    // Boston downtown
    (42.3564, -71.0622),
    (42.3480, -71.0810),
    (42.3503, -71.0770),
    (42.3598, -71.0589),
    (42.3637, -71.0589),
    (42.3663, -71.0621),
    (42.3523, -71.0551),
    (42.3550, -71.0600),
    (42.3522, -71.0622),
    (42.3389, -71.0740),
    // Boston neighbourhoods
    (42.3487, -71.0812),
    (42.3623, -71.0696),
    (42.3371, -71.1002),
    (42.3467, -71.0972),
    (42.3493, -71.0955),
    (42.3505, -71.0813),
    (42.3507, -71.0875),
    // Cambridge
    (42.3732, -71.1189),
    (42.3651, -71.1039),
    (42.3620, -71.0862),
    (42.3601, -71.0942),
    (42.3730, -71.1150),
    (42.3967, -71.1210),
    (42.3647, -71.1043),
    (42.3740, -71.1160),
    (42.3628, -71.0925),
    (42.3921, -71.1287),
    (42.3735, -71.1120),
    (42.3658, -71.1034),
    (42.3884, -71.1190),
    // Greater Boston
    (42.3656, -71.0096),
    (42.3456, -71.0322),
    (42.3664, -71.0546),
    (42.3588, -71.0711),
    (42.3477, -71.0950),
    (42.3378, -71.0891),
    (42.3669, -71.0612),
    (42.3429, -71.0491),
    (42.3100, -71.0800),
    (42.3159, -71.1214),
    (42.3493, -71.1604),
    (42.3505, -71.1372),
    (42.3333, -71.1042),
    (42.4084, -71.0537),
    (42.3876, -71.1190),
    (42.4251, -71.0662),
    (42.2529, -71.0023),
    (42.2183, -70.9410),
    (42.3370, -71.2092),
    (42.3373, -71.1200),
];

/// The built-in lantern deployment, ids "Lantern 1" to "Lantern 50".
pub fn lantern_nodes() -> Vec<StaticNode> {
    LANTERN_DEPLOYMENT
        .iter()
        .enumerate()
        .map(|(index, (lat, lng))| StaticNode::new(format!("Lantern {}", index + 1), *lat, *lng))
        .collect()
}
