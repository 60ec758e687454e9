//! Command-line surface for the office portal server.

mod cli_args;

pub use cli_args::Cli;
