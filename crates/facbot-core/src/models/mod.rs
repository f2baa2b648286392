//! Configuration and transcript data models.

pub mod config;
pub mod message;
