//! # Recording Export
//!
//! Turns persisted missions into gzipped JSON recordings for the playback
//! viewer, and reclaims storage by decimating soldier states.

pub mod error;
pub mod exporter;
pub mod reducer;

pub use error::{ExportError, Result};
pub use exporter::{
    build_recording, determine_end_frame, recording_filename, ExportSummary, Exporter, MissionData,
};
pub use reducer::{Reducer, DEFAULT_STRIDE};
