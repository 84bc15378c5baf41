use crate::prelude::{DashboardError, DashboardResult};
use crate::tracking::position::Position;
use std::sync::Arc;

/// Default number of positions retained for the tracked entity.
pub const DEFAULT_PATH_CAPACITY: usize = 100;

/// Bounded, chronologically ordered history of positions.
///
/// The vertex list is shared behind an `Arc`, so cloning a `Path` is cheap and
/// two clones of the same history compare equal under [`Path::same`]. Every
/// append produces a new identity, which is what the path overlay memoizes on.
#[derive(Debug, Clone)]
pub struct Path {
    positions: Arc<Vec<Position>>,
    capacity: usize,
}

impl Path {
    pub fn with_capacity(capacity: usize) -> DashboardResult<Self> {
        if capacity == 0 {
            return Err(DashboardError::Configuration(
                "path capacity must be greater than zero".into(),
            ));
        }
        Ok(Self {
            positions: Arc::new(Vec::with_capacity(capacity)),
            capacity,
        })
    }

    /// Returns a new path with `position` at the tail, evicting from the head
    /// until the length fits the capacity.
    pub fn append(&self, position: Position) -> Path {
        let keep = self.positions.len().min(self.capacity - 1);
        let skip = self.positions.len() - keep;
        let mut next = Vec::with_capacity(self.capacity);
        next.extend_from_slice(&self.positions[skip..]);
        next.push(position);
        Path {
            positions: Arc::new(next),
            capacity: self.capacity,
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Position> {
        self.positions.last()
    }

    /// True when both values share the same underlying history.
    pub fn same(&self, other: &Path) -> bool {
        Arc::ptr_eq(&self.positions, &other.positions)
    }
}

impl Default for Path {
    fn default() -> Self {
        Self {
            positions: Arc::new(Vec::with_capacity(DEFAULT_PATH_CAPACITY)),
            capacity: DEFAULT_PATH_CAPACITY,
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity && self.positions == other.positions
    }
}

/// Holds the current path and folds new positions into it.
#[derive(Debug, Clone, Default)]
pub struct PathAccumulator {
    path: Path,
}

impl PathAccumulator {
    pub fn new(capacity: usize) -> DashboardResult<Self> {
        Ok(Self {
            path: Path::with_capacity(capacity)?,
        })
    }

    pub fn seeded(capacity: usize, first: Position) -> DashboardResult<Self> {
        let mut accumulator = Self::new(capacity)?;
        accumulator.push(first);
        Ok(accumulator)
    }

    pub fn push(&mut self, position: Position) -> &Path {
        self.path = self.path.append(position);
        &self.path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(timestamp: i64) -> Position {
        Position::new(42.0, -71.0, timestamp)
    }

    fn timestamps(path: &Path) -> Vec<i64> {
        path.positions().iter().map(|p| p.timestamp).collect()
    }

    #[test]
    fn zero_capacity_is_a_configuration_error() {
        let err = Path::with_capacity(0).unwrap_err();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }

    #[test]
    fn default_accumulator_uses_the_default_capacity() {
        let mut acc = PathAccumulator::default();
        assert_eq!(acc.path().capacity(), DEFAULT_PATH_CAPACITY);
        assert_eq!(acc.push(at(1)).len(), 1);
    }

    #[test]
    fn overflow_keeps_the_latest_positions_in_order() {
        let mut acc = PathAccumulator::new(3).unwrap();
        for ts in 1..=5 {
            acc.push(at(ts));
        }
        assert_eq!(timestamps(acc.path()), vec![3, 4, 5]);
    }

    #[test]
    fn long_sequences_stay_at_capacity() {
        let cap = 7;
        let mut acc = PathAccumulator::new(cap).unwrap();
        for ts in 0..250 {
            acc.push(at(ts));
            assert!(acc.path().len() <= cap);
        }
        assert_eq!(timestamps(acc.path()), (243..250).collect::<Vec<_>>());
    }

    #[test]
    fn append_leaves_previous_path_untouched() {
        let base = Path::with_capacity(2).unwrap().append(at(1));
        let next = base.append(at(2));
        assert_eq!(timestamps(&base), vec![1]);
        assert_eq!(timestamps(&next), vec![1, 2]);
        assert!(!base.same(&next));
        assert!(next.same(&next.clone()));
    }

    #[test]
    fn capacity_of_one_holds_only_latest() {
        let path = Path::with_capacity(1)
            .unwrap()
            .append(at(1))
            .append(at(2));
        assert_eq!(timestamps(&path), vec![2]);
        assert_eq!(path.latest().map(|p| p.timestamp), Some(2));
    }
}
