// Shared domain types: used by the engine, the fetcher and the board view.
// None of those layers depend on each other for their data model; all import
// from this module.

pub mod common;
pub mod workflow_run;

pub use common::*;
pub use workflow_run::*;
