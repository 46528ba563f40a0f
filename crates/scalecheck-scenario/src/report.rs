//! Per-stage outcomes and the scenario verdict.

use serde::Serialize;

use crate::runner::Phase;

/// Logical stages of a scenario, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Baseline,
    Inject,
    ScaleUp,
    Drain,
    ScaleDown,
    Teardown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Baseline => "baseline",
            Stage::Inject => "inject",
            Stage::ScaleUp => "scale-up",
            Stage::Drain => "drain",
            Stage::ScaleDown => "scale-down",
            Stage::Teardown => "teardown",
        }
    }
}

/// Outcome of one stage. An assertion deadline elapsing is a `Failed`
/// outcome carrying the last observed value, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StageOutcome {
    Passed {
        /// Final observed value, when the stage observes one
        /// (replica count or completed-message count).
        observed: Option<u64>,
    },
    Failed {
        observed: Option<u64>,
        reason: String,
    },
    /// Not attempted because an earlier stage failed.
    Skipped,
}

impl StageOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, StageOutcome::Passed { .. })
    }
}

/// One stage's report.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed_ms: u64,
}

/// The scenario verdict: one outcome per stage plus an overall
/// pass/fail. Teardown errors are listed but never flip the verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub stages: Vec<StageReport>,
    pub passed: bool,
    /// Terminal phase of the run; `TornDown` on every exit path,
    /// since teardown is unconditional.
    pub phase: Phase,
    pub teardown_errors: Vec<String>,
}

impl ScenarioReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("scenario: {}\n", self.scenario));
        for report in &self.stages {
            let line = match &report.outcome {
                StageOutcome::Passed { observed: Some(v) } => {
                    format!("PASS (observed {v})")
                }
                StageOutcome::Passed { observed: None } => "PASS".to_string(),
                StageOutcome::Failed {
                    observed: Some(v),
                    reason,
                } => format!("FAIL (last observed {v}): {reason}"),
                StageOutcome::Failed {
                    observed: None,
                    reason,
                } => format!("FAIL: {reason}"),
                StageOutcome::Skipped => "SKIP".to_string(),
            };
            out.push_str(&format!(
                "  {:<10} {} [{}ms]\n",
                report.stage.as_str(),
                line,
                report.elapsed_ms,
            ));
        }
        for err in &self.teardown_errors {
            out.push_str(&format!("  teardown warning: {err}\n"));
        }
        out.push_str(&format!(
            "verdict: {}\n",
            if self.passed { "PASS" } else { "FAIL" },
        ));
        out
    }
}
