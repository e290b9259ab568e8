//! Domain types and pure logic shared by every `lswb` crate.
//!
//! Nothing in here talks to the network. Remote storage, the annotation
//! service and the dataset on disk live in their own crates and build on
//! the types defined here.

pub mod byte_range;
pub mod cargo_type;
pub mod config;
pub mod error;
pub mod file_lock;
pub mod paths;
pub mod retry;
pub mod sampling;
pub mod task;
pub mod types;
pub mod video_name;
