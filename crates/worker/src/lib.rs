//! Scheduled harvesting.
//!
//! The worker runs the same harvest pass the API exposes, on a fixed
//! interval, until it is cancelled.

pub mod cycle;
