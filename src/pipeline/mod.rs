//! Pipeline entry points and the crawl engine.
//!
//! - `run_pipeline`: discover departments, crawl every term, persist
//! - `run_replay`: persist a previously written snapshot
//! - `run_validate`: check and print the configuration

pub mod crawl;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod terms;
pub mod validate;
pub mod workers;

#[cfg(test)]
pub(crate) mod fakes;

pub use crawl::{Orchestrator, TermPhase};
pub use pipeline::{run_pipeline, run_replay};
pub use terms::expand_terms;
pub use validate::run_validate;
pub use workers::{ParseHandle, ParsePool};
