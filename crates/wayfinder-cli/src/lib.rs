//! Wayfinder CLI library.
//!
//! Map loading, request execution, logging setup and output formatting used
//! by the `wayfinder-cli` binary.

pub mod commands;
pub mod logging;
pub mod map;
pub mod output;
pub mod terminal;
