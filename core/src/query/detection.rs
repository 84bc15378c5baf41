use crate::geo::GeoPoint;
use crate::map::nodes::StaticNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single sensor observation as returned by the detection backend.
///
/// Coordinates are optional: summary payloads and some uploads omit them, and
/// the map treats that as "no coordinate data" instead of inventing a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Detection {
    pub id: String,
    pub timestamp: String,
    pub tpms_id: String,
    pub tpms_model: String,
    pub car_model: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Detection {
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                let point = GeoPoint::new(latitude, longitude);
                point.is_finite().then_some(point)
            }
            _ => None,
        }
    }

    /// Reduced record carrying only when, where and the coordinates.
    pub fn summary(&self) -> Detection {
        Detection {
            timestamp: self.timestamp.clone(),
            location: self.location.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DetectionsResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LatestResponse {
    #[serde(default)]
    pub latest: Vec<Detection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub detection: Detection,
}

/// A node the map should emphasise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightedNode {
    pub id: String,
    pub position: GeoPoint,
}

/// Highlighted nodes keyed (and therefore deduplicated) by id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HighlightSet {
    nodes: BTreeMap<String, GeoPoint>,
}

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlights every static node that one of `detections` was seen at.
    pub fn from_detections(detections: &[Detection], nodes: &[StaticNode]) -> Self {
        let mut set = Self::new();
        for detection in detections {
            if let Some(node) = nodes.iter().find(|node| node.id == detection.location) {
                set.insert(HighlightedNode {
                    id: node.id.clone(),
                    position: node.point(),
                });
            }
        }
        set
    }

    /// Later inserts with the same id replace the earlier position.
    pub fn insert(&mut self, node: HighlightedNode) {
        self.nodes.insert(node.id, node.position);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = HighlightedNode> + '_ {
        self.nodes.iter().map(|(id, position)| HighlightedNode {
            id: id.clone(),
            position: *position,
        })
    }
}

impl FromIterator<HighlightedNode> for HighlightSet {
    fn from_iter<I: IntoIterator<Item = HighlightedNode>>(iter: I) -> Self {
        let mut set = HighlightSet::new();
        for node in iter {
            set.insert(node);
        }
        set
    }
}
