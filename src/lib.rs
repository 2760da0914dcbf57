//! ReaLies: deepfake video detection from a bounded sample of frames.
//!
//! A video is sampled, decoded, turned into per-frame features or scores,
//! aggregated over time and mapped onto a graded label. [`Analyzer`] runs
//! the whole flow; the HTTP surface lives in [`server`].

pub mod aggregate;
pub mod config;
pub mod decision;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod sampler;
pub mod sequence_model;
pub mod server;

pub use config::Config;
pub use decision::{ClassificationResult, Label, Status};
pub use error::AnalysisError;
pub use pipeline::{Analyzer, AnalyzerSettings, Strategy};
