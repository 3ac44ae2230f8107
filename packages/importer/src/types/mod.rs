//! Data types shared across the pipeline.

pub mod codes;
pub mod entities;
pub mod ids;
pub mod job;
pub mod listing;
