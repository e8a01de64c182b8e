//! Core trait abstractions.

pub mod ai;
