//! # Mission Reducer
//!
//! Bulk-decimates soldier states by a frame stride, then vacuums the store
//! to reclaim the space. Stride-only: first and last frames get no special
//! treatment.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use ocap_persistence::{MaintenanceRepository, Storage};

/// Keep one soldier state in every five frames unless told otherwise.
pub const DEFAULT_STRIDE: u32 = 5;

pub struct Reducer {
    storage: Arc<dyn Storage>,
}

impl Reducer {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Delete every soldier state whose capture frame is off the stride
    /// grid, then vacuum. Returns the number of rows removed.
    pub async fn reduce(&self, mission_id: i64, stride: u32) -> Result<u64> {
        let stride = stride.max(1);
        let removed = self
            .storage
            .reduce_soldier_states(mission_id, stride)
            .await?;
        self.storage.vacuum().await?;

        info!(mission_id, stride, removed, "soldier states reduced");
        Ok(removed)
    }
}
