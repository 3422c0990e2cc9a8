//! CLI subcommands.

pub mod loyalty;
pub mod migrate;
