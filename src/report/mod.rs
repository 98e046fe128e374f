//! Artifact rendering.
//!
//! Templates, the shared render context, and atomic publishing of the
//! consulting report and slide outline.

pub mod generator;
pub mod template;

pub use generator::{write_atomic, ArtifactRenderer, Template};
