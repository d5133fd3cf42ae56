//! Tools for analysing the results of evolutionary algorithm experiments.
//!
//! The evolution runs leave behind a directory of result files: Hall of Fame
//! files listing the best genotypes, evolution logs, and runtimes. This crate
//! parses those files, labels them by experiment variant, and summarizes each
//! variant so that they can be compared. The [tsp] module compares the
//! results of travelling salesman heuristics against the known optima.

pub mod config;
pub mod convert;
pub mod experiment;
pub mod hof;
pub mod naming;
pub mod report;
pub mod serde_utils;
pub mod stats;
pub mod tsp;
