//! The training dataset on disk.
//!
//! Two layouts are supported (see [`DatasetLayout`]). Everything in this
//! crate is synchronous filesystem work; async callers run it on a
//! blocking thread.

pub mod analyzer;
pub mod archive;
pub mod builder;
pub mod duplicates;
pub mod error;
pub mod layout;
pub mod registry;
pub mod split;

pub use analyzer::{analyze, AnalysisResult, ClassStats, DatasetAnalysis};
pub use archive::{ensure_archive, ArchiveInfo};
pub use builder::{build, remove_dataset, BuildOptions, BuildReport, BuildStatus, SkippedTask};
pub use duplicates::{check_duplicates, ClassConflict, DuplicateReport};
pub use error::DatasetError;
pub use layout::{DatasetEntry, Split};
pub use lswb_core::types::DatasetLayout;
pub use registry::ClassRegistry;
pub use split::SplitRatios;
