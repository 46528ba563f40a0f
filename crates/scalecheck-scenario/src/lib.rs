//! scalecheck-scenario — the scenario orchestrator.
//!
//! Sequences setup, load injection, replica-count assertions, drain,
//! and teardown as an explicit state machine, so the ordering
//! invariants of a scaling validation run are checkable rather than
//! incidental to statement order. Every run produces one
//! [`ScenarioReport`] with a per-stage outcome and an overall
//! verdict, and teardown executes on every exit path.

pub mod report;
pub mod runner;

pub use report::{ScenarioReport, Stage, StageOutcome, StageReport};
pub use runner::{Phase, ScenarioRunner};
