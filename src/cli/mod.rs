//! Command-line interface.

mod args;
pub mod serve;

pub use args::{Cli, Commands};
