//! Shared helpers for frontends

pub mod color;

pub use color::ColorParser;
