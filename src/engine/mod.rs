//! Correction engine: command segmentation, per-kind rule matching and
//! per-parameter composition.

pub mod compose;
pub mod matcher;
pub mod segment;

pub use compose::{compose_corrections, ParamCorrection};
pub use matcher::{apply_rule, describe, matches_tool_alias, Correction};
pub use segment::{apply_segment, split_segments, Segment};
