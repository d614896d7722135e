//! sealwatch daemon library.
//!
//! Provides settings loading, the command-line interface and shutdown
//! handling for the `sealwatch` binary.

pub mod config;
pub mod shutdown;
