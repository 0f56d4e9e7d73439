#![forbid(unsafe_code)]

//! Headless harness for the Tessera grid engine.
//!
//! Replays scripted [`scenario`]s on a virtual clock, fuzzes the engine with
//! seeded op [`storm`]s, and reduces a final layout to a stable
//! [`golden::layout_checksum`] so regressions show up as a changed hash.

pub mod cli;
pub mod error;
pub mod golden;
pub mod logging;
pub mod scenario;
pub mod storm;

pub use cli::{Cli, Commands, run, run_from_env};
pub use error::{HarnessError, Result};
