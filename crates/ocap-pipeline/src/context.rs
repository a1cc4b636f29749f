//! # Mission Context
//!
//! Process-wide holder of the current World and Mission. Mission creation
//! takes the write lock; every processor takes a read clone per record so a
//! mid-mission reload is tolerated.

use std::sync::RwLock;

use chrono::Utc;
use ocap_domain::{Mission, Position, World};

/// Snapshot of the mission currently being recorded.
#[derive(Debug, Clone)]
pub struct CurrentMission {
    pub mission: Mission,
    pub world: World,
}

impl CurrentMission {
    /// Sentinel used before any `:NEW:MISSION:` call so early reads never
    /// crash.
    fn unloaded() -> Self {
        Self {
            mission: Mission {
                id: 0,
                mission_name: "No mission loaded".to_string(),
                briefing_name: "No mission loaded".to_string(),
                mission_name_source: String::new(),
                on_load_name: String::new(),
                author: String::new(),
                server_name: String::new(),
                server_profile: String::new(),
                start_time: Utc::now(),
                capture_delay: 1.0,
                addon_version: String::new(),
                extension_version: String::new(),
                extension_build: String::new(),
                tag: String::new(),
                world_id: 0,
            },
            world: World {
                id: 0,
                author: String::new(),
                workshop_id: String::new(),
                display_name: "No mission loaded".to_string(),
                world_name: String::new(),
                world_name_original: String::new(),
                world_size: 0.0,
                latitude: 0.0,
                longitude: 0.0,
                location: Position::default(),
            },
        }
    }

    /// Whether a real mission has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.mission.id != 0
    }
}

/// Read/write-locked holder shared by the router, processors, and exporter.
#[derive(Debug)]
pub struct MissionContext {
    inner: RwLock<CurrentMission>,
}

impl MissionContext {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CurrentMission::unloaded()),
        }
    }

    /// Clone the current snapshot. Processors call this once per record.
    pub fn current(&self) -> CurrentMission {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Install a freshly created mission. Called only by the mission
    /// processor.
    pub fn set(&self, mission: Mission, world: World) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = CurrentMission { mission, world };
    }
}

impl Default for MissionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context_is_sentinel() {
        let ctx = MissionContext::new();
        let current = ctx.current();
        assert!(!current.is_loaded());
        assert_eq!(current.mission.mission_name, "No mission loaded");
    }
}
