use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Node of a node-link graph; attributes beyond `id` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: Value,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: Value,
    pub target: Value,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GraphData {
    pub directed: bool,
    pub multigraph: bool,
    pub graph: Map<String, Value>,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphEdge>,
}

/// Sensors the backend believes belong to one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleGroup {
    pub group: Vec<String>,
    #[serde(rename = "totalEdgeWeight")]
    pub total_edge_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GraphResponse {
    pub graph: GraphData,
    pub vehicle_groups: Vec<VehicleGroup>,
    pub confidence_scores: BTreeMap<String, f64>,
}

impl GraphResponse {
    pub fn confidence(&self, node_id: &str) -> Option<f64> {
        self.confidence_scores.get(node_id).copied()
    }

    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "graph: {} nodes / {} links",
            self.graph.nodes.len(),
            self.graph.links.len()
        )];
        for group in &self.vehicle_groups {
            lines.push(format!(
                "sensors {} (total edge weight {:.2})",
                group.group.join(", "),
                group.total_edge_weight
            ));
        }
        for (node, score) in &self.confidence_scores {
            lines.push(format!("node {node}: confidence {score:.2}"));
        }
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkResponse {
    pub tire_detected_by_id: Option<Vec<i64>>,
    pub tire_detected_by_model: Option<Vec<i64>>,
    pub node_path: Option<Vec<i64>>,
    pub path_node_coordinates: Option<Vec<Coordinate>>,
}

impl NetworkResponse {
    /// Computed path vertices, skipping any non-finite coordinates.
    pub fn route_points(&self) -> Vec<GeoPoint> {
        self.path_node_coordinates
            .iter()
            .flatten()
            .map(|c| GeoPoint::new(c.latitude, c.longitude))
            .filter(GeoPoint::is_finite)
            .collect()
    }

    pub fn describe(&self) -> Vec<String> {
        let join = |ids: &Vec<i64>, sep: &str| {
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(sep)
        };
        let mut lines = Vec::new();
        if let Some(ids) = self.tire_detected_by_id.as_ref().filter(|v| !v.is_empty()) {
            lines.push(format!("detected by id: {}", join(ids, ", ")));
        }
        if let Some(ids) = self.tire_detected_by_model.as_ref().filter(|v| !v.is_empty()) {
            lines.push(format!("detected by model: {}", join(ids, ", ")));
        }
        if let Some(path) = self.node_path.as_ref().filter(|v| !v.is_empty()) {
            lines.push(format!("node path: {}", join(path, " -> ")));
        }
        lines
    }
}
