//! Data types for the contract pipeline.

pub mod chunk;
pub mod config;
pub mod contract;
pub mod outcome;
pub mod stage;
