//! Student performance analytics.
//!
//! Load exam marks into a [`data::RecordSet`], derive summaries, rankings,
//! clusters, declines and suggestions from it, and export any resulting
//! table as a PDF report.

pub mod analytics;
pub mod api;
pub mod cluster;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod model;
pub mod report;
pub mod suggestions;

pub use config::Settings;
pub use data::{Exam, Record, RecordFilter, RecordSet};
pub use error::{AnalyticsError, Result};
