//! Damage regions and per-output damage accumulation.

/// Set-valued pixel areas.
pub mod region;
/// Pending damage and buffer-age compensation.
pub mod tracker;
