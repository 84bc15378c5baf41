use crate::geo::GeoPoint;
use crate::map::nodes::StaticNode;
use crate::query::{Detection, HighlightSet, RangeFilter};
use crate::tracking::{Path, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const PATH_LAYER_ID: &str = "vehicle-path";
pub const PATH_WIDTH_PX: f32 = 2.0;
pub const PATH_COLOR: [u8; 4] = [255, 0, 0, 200];

/// What to do with a detection that carries no usable coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFallback {
    /// Leave it off the map and list it as unplaced.
    #[default]
    Unplaced,
    /// Draw it at the static node named by its `location`, flagged approximate.
    AnchorToNode,
}

/// Polyline layer for the tracked path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathLayer {
    pub id: &'static str,
    pub vertices: Vec<GeoPoint>,
    pub width_px: f32,
    pub color: [u8; 4],
}

impl PathLayer {
    pub fn from_path(path: &Path) -> Self {
        Self {
            id: PATH_LAYER_ID,
            vertices: path.positions().iter().map(Position::point).collect(),
            width_px: PATH_WIDTH_PX,
            color: PATH_COLOR,
        }
    }
}

/// Stable identity of an overlay across reconciliations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverlayKey {
    Tracked,
    Node(String),
    Ring(String),
    Result { index: usize, id: String },
    Range,
    Path,
    NetworkRoute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    TrackedMarker {
        position: GeoPoint,
    },
    NodeMarker {
        id: String,
        position: GeoPoint,
    },
    ResultMarker {
        label: String,
        position: GeoPoint,
        approximate: bool,
    },
    HighlightRing {
        id: String,
        center: GeoPoint,
        radius_m: f64,
    },
    RangeCircle {
        center: GeoPoint,
        radius_km: f64,
    },
    PathLine(Arc<PathLayer>),
    NetworkRoute {
        vertices: Vec<GeoPoint>,
    },
}

/// A search result that could not be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnplacedDetection {
    pub id: String,
    pub location: String,
}

impl UnplacedDetection {
    pub fn label(&self) -> String {
        let location = if self.location.is_empty() {
            "unknown location"
        } else {
            self.location.as_str()
        };
        format!("{} at {location}: no coordinate data", self.id)
    }
}

/// Everything the overlay set is derived from.
#[derive(Debug, Clone, Copy)]
pub struct OverlayInputs<'a> {
    pub position: Option<&'a Position>,
    pub path_layer: Option<&'a Arc<PathLayer>>,
    pub nodes: &'a [StaticNode],
    pub results: &'a [Detection],
    pub highlights: &'a HighlightSet,
    pub range: Option<&'a RangeFilter>,
    pub route: &'a [GeoPoint],
    pub fallback: CoordinateFallback,
    pub ring_radius_m: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlaySet {
    overlays: BTreeMap<OverlayKey, Overlay>,
    unplaced: Vec<UnplacedDetection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayDiff {
    pub added: Vec<OverlayKey>,
    pub removed: Vec<OverlayKey>,
    pub changed: Vec<OverlayKey>,
}

impl OverlayDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl OverlaySet {
    /// Builds the complete overlay set from scratch. Nothing from a previous
    /// set survives unless the inputs still produce it.
    pub fn compose(inputs: &OverlayInputs<'_>) -> Self {
        let mut overlays = BTreeMap::new();
        let mut unplaced = Vec::new();

        if let Some(position) = inputs.position {
            overlays.insert(
                OverlayKey::Tracked,
                Overlay::TrackedMarker {
                    position: position.point(),
                },
            );
        }

        for node in inputs.nodes {
            overlays.insert(
                OverlayKey::Node(node.id.clone()),
                Overlay::NodeMarker {
                    id: node.id.clone(),
                    position: node.point(),
                },
            );
            if inputs.highlights.contains(&node.id) {
                overlays.insert(
                    OverlayKey::Ring(node.id.clone()),
                    Overlay::HighlightRing {
                        id: node.id.clone(),
                        center: node.point(),
                        radius_m: inputs.ring_radius_m,
                    },
                );
            }
        }

        for (index, detection) in inputs.results.iter().enumerate() {
            let placed = match (detection.point(), inputs.fallback) {
                (Some(point), _) => Some((point, false)),
                (None, CoordinateFallback::AnchorToNode) => inputs
                    .nodes
                    .iter()
                    .find(|node| node.id == detection.location)
                    .map(|node| (node.point(), true)),
                (None, CoordinateFallback::Unplaced) => None,
            };
            match placed {
                Some((position, approximate)) => {
                    overlays.insert(
                        OverlayKey::Result {
                            index,
                            id: detection.id.clone(),
                        },
                        Overlay::ResultMarker {
                            label: result_label(detection),
                            position,
                            approximate,
                        },
                    );
                }
                None => unplaced.push(UnplacedDetection {
                    id: detection.id.clone(),
                    location: detection.location.clone(),
                }),
            }
        }

        if let Some(range) = inputs.range {
            overlays.insert(
                OverlayKey::Range,
                Overlay::RangeCircle {
                    center: range.center,
                    radius_km: range.radius_km,
                },
            );
        }

        if let Some(layer) = inputs.path_layer {
            overlays.insert(OverlayKey::Path, Overlay::PathLine(Arc::clone(layer)));
        }

        if inputs.route.len() > 1 {
            overlays.insert(
                OverlayKey::NetworkRoute,
                Overlay::NetworkRoute {
                    vertices: inputs.route.to_vec(),
                },
            );
        }

        Self { overlays, unplaced }
    }

    pub fn diff(&self, previous: &OverlaySet) -> OverlayDiff {
        let mut diff = OverlayDiff::default();
        for (key, overlay) in &self.overlays {
            match previous.overlays.get(key) {
                None => diff.added.push(key.clone()),
                Some(old) if old != overlay => diff.changed.push(key.clone()),
                Some(_) => {}
            }
        }
        diff.removed = previous
            .overlays
            .keys()
            .filter(|key| !self.overlays.contains_key(*key))
            .cloned()
            .collect();
        diff
    }

    pub fn get(&self, key: &OverlayKey) -> Option<&Overlay> {
        self.overlays.get(key)
    }

    pub fn contains(&self, key: &OverlayKey) -> bool {
        self.overlays.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OverlayKey, &Overlay)> {
        self.overlays.iter()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn unplaced(&self) -> &[UnplacedDetection] {
        &self.unplaced
    }
}

fn result_label(detection: &Detection) -> String {
    match (detection.tpms_id.is_empty(), detection.timestamp.is_empty()) {
        (false, false) => format!("{} @ {}", detection.tpms_id, detection.timestamp),
        (false, true) => detection.tpms_id.clone(),
        _ => detection.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::HighlightedNode;

    fn nodes() -> Vec<StaticNode> {
        vec![
            StaticNode::new("A", 42.0, -71.0),
            StaticNode::new("B", 42.1, -71.1),
        ]
    }

    fn highlights(ids: &[&str]) -> HighlightSet {
        ids.iter()
            .map(|id| HighlightedNode {
                id: id.to_string(),
                position: GeoPoint::new(0.0, 0.0),
            })
            .collect()
    }

    fn inputs<'a>(
        nodes: &'a [StaticNode],
        results: &'a [Detection],
        highlights: &'a HighlightSet,
        fallback: CoordinateFallback,
    ) -> OverlayInputs<'a> {
        OverlayInputs {
            position: None,
            path_layer: None,
            nodes,
            results,
            highlights,
            range: None,
            route: &[],
            fallback,
            ring_radius_m: 50.0,
        }
    }

    #[test]
    fn stale_highlight_ring_is_removed() {
        let nodes = nodes();
        let both = highlights(&["A", "B"]);
        let only_b = highlights(&["B"]);
        let before = OverlaySet::compose(&inputs(&nodes, &[], &both, CoordinateFallback::Unplaced));
        let after =
            OverlaySet::compose(&inputs(&nodes, &[], &only_b, CoordinateFallback::Unplaced));

        assert!(!after.contains(&OverlayKey::Ring("A".into())));
        assert!(after.contains(&OverlayKey::Ring("B".into())));
        let diff = after.diff(&before);
        assert_eq!(diff.removed, vec![OverlayKey::Ring("A".into())]);
        assert!(diff.added.is_empty());
    }

    #[test]
    fn highlights_for_unrendered_nodes_draw_nothing() {
        let nodes = nodes();
        let set = highlights(&["Z"]);
        let overlays =
            OverlaySet::compose(&inputs(&nodes, &[], &set, CoordinateFallback::Unplaced));
        assert_eq!(overlays.len(), 2);
    }

    #[test]
    fn composing_identical_inputs_is_idempotent() {
        let nodes = nodes();
        let set = highlights(&["A"]);
        let results = vec![Detection {
            id: "1".into(),
            latitude: Some(42.05),
            longitude: Some(-71.05),
            ..Default::default()
        }];
        let first =
            OverlaySet::compose(&inputs(&nodes, &results, &set, CoordinateFallback::Unplaced));
        let second =
            OverlaySet::compose(&inputs(&nodes, &results, &set, CoordinateFallback::Unplaced));
        assert_eq!(first, second);
        assert!(second.diff(&first).is_empty());
    }

    #[test]
    fn missing_coordinates_are_never_fabricated() {
        let nodes = nodes();
        let set = HighlightSet::new();
        let results = vec![Detection {
            id: "7".into(),
            location: "A".into(),
            ..Default::default()
        }];

        let unplaced =
            OverlaySet::compose(&inputs(&nodes, &results, &set, CoordinateFallback::Unplaced));
        assert_eq!(unplaced.unplaced().len(), 1);
        assert!(unplaced.unplaced()[0].label().contains("no coordinate data"));
        assert!(unplaced
            .iter()
            .all(|(key, _)| !matches!(key, OverlayKey::Result { .. })));

        let anchored =
            OverlaySet::compose(&inputs(&nodes, &results, &set, CoordinateFallback::AnchorToNode));
        let marker = anchored.get(&OverlayKey::Result {
            index: 0,
            id: "7".into(),
        });
        assert_eq!(
            marker,
            Some(&Overlay::ResultMarker {
                label: "7".into(),
                position: GeoPoint::new(42.0, -71.0),
                approximate: true,
            })
        );
    }

    #[test]
    fn path_and_tracked_marker_follow_inputs() {
        let nodes = Vec::new();
        let set = HighlightSet::new();
        let position = Position::new(1.0, 2.0, 5);
        let path = Path::with_capacity(4).unwrap().append(position);
        let layer = Arc::new(PathLayer::from_path(&path));
        let mut composed = inputs(&nodes, &[], &set, CoordinateFallback::Unplaced);
        composed.position = Some(&position);
        composed.path_layer = Some(&layer);

        let overlays = OverlaySet::compose(&composed);
        assert_eq!(
            overlays.get(&OverlayKey::Tracked),
            Some(&Overlay::TrackedMarker {
                position: GeoPoint::new(1.0, 2.0)
            })
        );
        match overlays.get(&OverlayKey::Path) {
            Some(Overlay::PathLine(line)) => {
                assert_eq!(line.id, "vehicle-path");
                assert_eq!(line.vertices, vec![GeoPoint::new(1.0, 2.0)]);
            }
            other => panic!("unexpected path overlay {other:?}"),
        }
    }
}
