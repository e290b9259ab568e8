//! Remote storage access for the harvesting pipeline.
//!
//! [`RemoteFileSystem`] is the seam the pipeline talks to. [`WebDavClient`]
//! implements it over HTTP, [`LocalDirectory`] over a local directory tree
//! (an rclone mount, or a fixture in tests). [`Remount`] recovers a dropped
//! FUSE mount of the frame storage.

pub mod client;
pub mod error;
pub mod fs;
pub mod local;
pub mod remount;

pub use client::WebDavClient;
pub use error::RemoteError;
pub use fs::{RemoteEntry, RemoteFileSystem};
pub use local::LocalDirectory;
pub use remount::{NoRemount, RcloneMount, Remount};
