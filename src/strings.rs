// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! User interaction strings are stored here.

pub const DEFAULT_GENERATOR_NAME: &str = "wordfeed";
pub const STDOUT_NAME: &str = "stdout";

/// Indexed by `BatteryKind as usize`.
pub const BATTERY_NAMES: [&str; 3] = ["SmallCrush", "Crush", "BigCrush"];

pub const STREAM_CLOSED_STR: &str = "Stream closed by reader";
pub const COMPLETED_STR: &str = "Completed";
