//! tsl-cli: Command-line interface for the touchscreen instrument launcher
//!
//! Provides the `touchscreen-launcher` binary that brings up the audio
//! server and instrument, and small tools for inspecting and patching the
//! audio graph by hand.

pub mod commands;
pub mod output;
