//! Pure computation engines behind the analysis endpoints.
//!
//! Each sibling module covers one family of calculations (descriptive
//! statistics, correlation, trend, spatial interpolation) and is free of any
//! store or HTTP concerns, so every algorithm here is testable on plain
//! slices. Route handlers compose these with the query layer in `store.rs`.

pub mod correlation;
pub mod spatial;
pub mod stats;
pub mod trend;
