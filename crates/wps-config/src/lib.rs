//! WPS link configuration management
//!
//! This crate provides configuration loading and parsing for the link layer:
//! - TOML configuration file parsing
//! - Link configuration structures

pub mod link_config;
pub mod toml_config;

pub use link_config::*;
pub use toml_config::*;
