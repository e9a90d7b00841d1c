//! # hytale-dev-core
//!
//! Core types for running a local Hytale server during plugin development.
//!
//! This crate provides:
//! - `local.properties` loading with a generated default file
//! - Lookup of the installed game for a given version
//! - Server and JVM argument construction
//! - The shared error type

pub mod args;
pub mod config;
pub mod error;
pub mod install;

pub use args::{DEBUG_AGENT_ARG, DEBUG_PORT, SERVER_JAR_NAME, launch_args, server_args};
pub use config::{AuthMode, CONFIG_FILE_NAME, OwnerIdentity, Properties, ServerConfig};
pub use error::{HytaleDevError, Result};
pub use install::{Installation, InstallationLocator};
