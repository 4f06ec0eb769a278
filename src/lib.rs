//! Scriptvault: store scripts centrally, run them on the master or across agents.
//!
//! Bodies live in a script directory, metadata in a YAML catalog, history in a
//! mirror. Runs fan out sequentially and come back as one labelled report.

pub mod cli;
pub mod core;
pub mod mirror;
pub mod runtime;
pub mod transport;
