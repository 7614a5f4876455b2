//! Core utilities for the WPS link layer
//!
//! This crate provides the leaf types shared across the link layer:
//! - QX.Y fixed point arithmetic and running mean
//! - Link error taxonomy
//! - Frame outcome, LQI mode, sleep level and node role enums
//! - Logging setup

pub mod debug;
pub mod fixed_point;
pub mod fp_mean;
pub mod link_error;
pub mod link_types;

// Re-export commonly used items
pub use fixed_point::{FormatSource, FpError, FpFormat, QNum};
pub use fp_mean::FpMean;
pub use link_error::LinkError;
pub use link_types::*;

/// Index of a physical radio in a multi-radio setup
pub type RadioIdx = u8;
