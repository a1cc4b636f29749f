//! In-process association cache.
//!
//! Maps `(mission_id, ocap_id)` to the database row id of a soldier or
//! vehicle. The batched writer populates it as parent inserts commit;
//! processors consult it before falling back to a storage lookup. The grace
//! window remains the correctness fallback for records that arrive before
//! their parent has been flushed at all.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct AssociationCache {
    soldiers: Mutex<HashMap<(i64, u16), i64>>,
    vehicles: Mutex<HashMap<(i64, u16), i64>>,
}

impl AssociationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_soldier(&self, mission_id: i64, ocap_id: u16, row_id: i64) {
        self.soldiers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert((mission_id, ocap_id), row_id);
    }

    pub fn insert_vehicle(&self, mission_id: i64, ocap_id: u16, row_id: i64) {
        self.vehicles
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert((mission_id, ocap_id), row_id);
    }

    pub fn soldier(&self, mission_id: i64, ocap_id: u16) -> Option<i64> {
        self.soldiers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&(mission_id, ocap_id))
            .copied()
    }

    pub fn vehicle(&self, mission_id: i64, ocap_id: u16) -> Option<i64> {
        self.vehicles
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&(mission_id, ocap_id))
            .copied()
    }

    /// Forget everything. Called when a new mission loads.
    pub fn clear(&self) {
        self.soldiers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        self.vehicles
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_resolves_and_clears() {
        let cache = AssociationCache::new();
        cache.insert_soldier(1, 7, 42);
        cache.insert_vehicle(1, 7, 99);

        // Soldier and vehicle id spaces are independent
        assert_eq!(cache.soldier(1, 7), Some(42));
        assert_eq!(cache.vehicle(1, 7), Some(99));
        assert_eq!(cache.soldier(2, 7), None);

        cache.clear();
        assert_eq!(cache.soldier(1, 7), None);
    }
}
