//! Conformance harness for bufopen.
//!
//! This crate provides:
//! - Scenarios: end-to-end checks of buffered and pre-append behaviour on
//!   real files in a scratch directory
//! - Runner: executes scenarios and reports per-scenario results
//! - Structured logging: JSONL records of each run, plus a line validator

#![forbid(unsafe_code)]

pub mod error;
pub mod runner;
pub mod scenarios;
pub mod structured_log;

pub use error::{HarnessError, HarnessResult};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::Scenario;
