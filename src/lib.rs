//! vaino - Infrastructure Drift Detection Library
//!
//! This library exposes the snapshot store, the drift differ, timeline
//! analysis and the report renderers used by the `vaino` binary.

pub mod actionable;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod constants;
pub mod differ;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod storage;
pub mod timeline;
