//! # hss-cli: command-line front end for the harmonic study pipeline
//!
//! Wires the stage crates together: expansion preview, the full
//! expand/gate/schedule/aggregate/boundary run against the simulated
//! engine, and standalone aggregation and boundary computation over
//! existing raw exports.

pub mod cli;
