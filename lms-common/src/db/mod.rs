//! Database models and queries

pub mod models;

#[cfg(feature = "sqlx")]
pub mod init;
#[cfg(feature = "sqlx")]
pub mod migrations;
#[cfg(feature = "sqlx")]
pub mod training;

pub use models::*;

#[cfg(feature = "sqlx")]
pub use init::{init_database, init_memory_database};
#[cfg(feature = "sqlx")]
pub use training::ProgressFilter;
