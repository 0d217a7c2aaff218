//! # Anthem Common Library
//!
//! Shared code for the Anthem song-generation client including:
//! - Domain model (song prompts, job status, status snapshots)
//! - Status step tables (pipeline profiles)
//! - Event types (AnthemEvent enum) and EventBus
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod steps;

pub use error::{Error, Result};
pub use model::JobStatus;
pub use steps::StatusTable;
