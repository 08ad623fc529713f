//! Command-line interface: argument parsing, command handlers and signal
//! handling.

pub mod args;
pub mod commands;
pub mod shutdown;
