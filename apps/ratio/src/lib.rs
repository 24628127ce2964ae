//! # Ratio
//!
//! Command-line front end for the `ratio-core` store.
//!
//! - `config`: TOML configuration file and flag overrides
//! - `cli`: clap command tree, caller-side checks and output rendering

pub mod cli;
pub mod config;
