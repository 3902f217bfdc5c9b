//! Utility helpers

pub mod env;
