//! Operational tooling around the manifest core.

pub mod cli;
