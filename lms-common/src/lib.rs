//! # LMS Common Library
//!
//! Shared code for the LMS services including:
//! - Training data model (categories, definitions, progress records)
//! - Database initialization and schema versioning
//! - Configuration loading
//! - Bearer token validation

pub mod api;
pub mod config;
pub mod db;
pub mod error;

pub use db::models::{Category, ProgressStatus, RecordId, TrainingKey};
pub use error::{Error, Result};
