//! Config sync for the dbus-serialbattery driver.
//!
//! Edits the driver's `config.ini` without disturbing its layout, and moves
//! it to and from a Venus OS device over SSH.
//!
//! # Architecture
//!
//! - [`document`] - Line-preserving config document
//! - [`session`] - One loaded file plus its dirty state
//! - [`profile`] - Connection profile and its on-disk store
//! - [`remote`] - Pull, push and apply over a pluggable transport
//! - [`config`] - State directory and runtime settings
//! - [`file`] - Atomic file writes
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod file;
pub mod profile;
pub mod remote;
pub mod session;

pub use error::{Error, Result};
