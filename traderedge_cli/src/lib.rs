//! Internal modules for the TraderEdge command-line client.
//!
//! This library provides command parsing and execution used by the
//! `traderedge` binary.

pub mod app;
pub mod commands;
