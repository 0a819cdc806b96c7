//! Declares and compiles the T-MARS filtering pipeline for the Datacomp
//! dataset.
//!
//! [`datacomp::build_pipeline`] declares the eight stages, and
//! [`pipeline::compile`] validates them and emits the compose spec an
//! external orchestrator runs.

pub mod base_path;
pub mod config;
pub mod datacomp;
pub mod error;
pub mod logger;
pub mod pipeline;

pub use error::{FilterError, FilterResult};
