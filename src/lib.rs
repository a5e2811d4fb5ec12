//! A rule evaluation engine for French local-government endowments ("dotations").
//!
//! The legislation is expressed as a graph of variables (eligibility tests, scores, amounts,
//! guarantees) evaluated over a population of communes for a given year. See
//! [`simulation::Simulation`] for the engine and [`rules::registry`] for the legislation.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod entity;
pub mod error;
pub mod id;
pub mod input;
pub mod log;
pub mod numeric;
pub mod parameter;
pub mod period;
pub mod rules;
pub mod settings;
pub mod simulation;
pub mod store;
pub mod trace;
pub mod value;
pub mod variable;

#[cfg(test)]
mod fixture;

/// Get the directory where the crate's configuration files are stored.
///
/// Falls back to the current directory on platforms without a configuration directory.
pub fn get_dotations_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("dotations");
    path
}
