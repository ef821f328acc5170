//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure for the media session core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Status event delivery to the scripting side
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the playback core depends on. It
//! establishes the configuration builder, the logging conventions and the
//! single-listener event sink every session emits through.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
