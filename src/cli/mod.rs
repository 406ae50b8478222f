//! CLI module for batchr - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for one-shot planning,
//! simulation runs and config inspection.

pub mod commands;

pub use commands::Cli;
