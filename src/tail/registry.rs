use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Set of connected live-tail viewers
#[derive(Debug, Default)]
pub struct ViewerRegistry {
    active: Mutex<HashSet<Uuid>>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a viewer; it is removed again when the guard drops
    pub fn register(self: &Arc<Self>) -> ViewerGuard {
        let id = Uuid::new_v4();
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        tracing::debug!(viewer = %id, "Viewer connected");
        ViewerGuard {
            id,
            registry: Arc::clone(self),
        }
    }

    pub fn count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug)]
pub struct ViewerGuard {
    id: Uuid,
    registry: Arc<ViewerRegistry>,
}

impl ViewerGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        tracing::debug!(viewer = %self.id, "Viewer disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_track_active_viewers() {
        let registry = Arc::new(ViewerRegistry::new());
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.count(), 2);

        drop(a);
        assert_eq!(registry.count(), 1);
        drop(b);
        assert_eq!(registry.count(), 0);
    }
}
