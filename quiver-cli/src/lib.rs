//! Quiver CLI - Command-line interface for search migrations.
//!
//! This crate provides the `quiver` binary for generating migration files
//! from a schema, applying them to a search service and inspecting
//! migration status.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
