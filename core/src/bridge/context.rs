use crate::query::{Detection, HighlightSet};
use std::sync::Arc;
use tokio::sync::watch;

/// Single-value cell shared between a writer surface and any number of
/// readers. Starts at `T::default()`, so reading before the first write
/// yields the empty value.
#[derive(Debug)]
pub struct SharedContext<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for SharedContext<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone + Default + PartialEq> Default for SharedContext<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default + PartialEq> SharedContext<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(T::default());
        Self { tx: Arc::new(tx) }
    }

    /// Last write wins. Returns false, and wakes nobody, when `value` equals
    /// what is already stored.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> ContextReader<T> {
        ContextReader {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextReader<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> ContextReader<T> {
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// The new value if one was written since the last take, without waiting.
    pub fn take_update(&mut self) -> Option<T> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// Waits for the next write. `None` once every writer is gone.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// The two values search surfaces hand to the map. One instance per
/// dashboard session.
#[derive(Debug, Clone, Default)]
pub struct DashboardContexts {
    pub results: SharedContext<Vec<Detection>>,
    pub highlights: SharedContext<HighlightSet>,
}

impl DashboardContexts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(id: &str) -> Detection {
        Detection {
            id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn read_before_write_is_empty() {
        let contexts = DashboardContexts::new();
        assert!(contexts.results.get().is_empty());
        assert!(contexts.highlights.subscribe().current().is_empty());
    }

    #[test]
    fn last_write_wins_and_readers_see_it_immediately() {
        let context = SharedContext::<Vec<Detection>>::new();
        let mut reader = context.subscribe();
        context.set(vec![detection("1")]);
        context.set(vec![detection("2")]);
        assert_eq!(reader.take_update(), Some(vec![detection("2")]));
        assert_eq!(reader.take_update(), None);
    }

    #[test]
    fn rewriting_the_same_value_does_not_notify() {
        let context = SharedContext::<Vec<Detection>>::new();
        let mut reader = context.subscribe();
        assert!(context.set(vec![detection("1")]));
        reader.take_update();
        assert!(!context.set(vec![detection("1")]));
        assert_eq!(reader.take_update(), None);
    }

    #[tokio::test]
    async fn changed_wakes_on_write() {
        let context = SharedContext::<Vec<Detection>>::new();
        let mut reader = context.subscribe();
        let writer = context.clone();
        tokio::spawn(async move {
            writer.set(vec![detection("late")]);
        });
        assert_eq!(reader.changed().await, Some(vec![detection("late")]));
    }
}
