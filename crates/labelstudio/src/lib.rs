//! Client for the Label Studio REST API.
//!
//! The pipeline only depends on [`AnnotationService`]; [`LabelStudioApi`]
//! is the HTTP implementation.

pub mod api;
pub mod service;

pub use api::{LabelStudioApi, LabelStudioError};
pub use service::AnnotationService;
