//! Scenario orchestrator.
//!
//! Drives one validation run through its stages: setup, baseline
//! assertion, load injection, scale-up assertion, drain, scale-down
//! assertion, teardown. Stages execute strictly sequentially because
//! scaling is a time-ordered causal chain; a failure short-circuits
//! the remaining forward stages but teardown always runs.

use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info};

use scalecheck_cluster::{ControlPlane, LifecycleManager, ResourceSpec};
use scalecheck_core::{
    HarnessConfig, QueueTriggerConfig, ResourceKind, ResourceRecord, Scenario, manifest,
};
use scalecheck_poll::{PollConfig, wait_for};
use scalecheck_queue::{LoadDriver, QueueAdmin, QueueData};

use crate::report::{ScenarioReport, Stage, StageOutcome, StageReport};

/// Progress of a scenario through its state machine.
///
/// `TornDown` is reachable from any state; every other transition
/// requires the preceding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    ResourcesUp,
    BaselineVerified,
    LoadInjected,
    ScaledUpVerified,
    LoadDrained,
    ScaledDownVerified,
    TornDown,
}

impl Phase {
    /// Whether `next` is a legal transition from this phase.
    ///
    /// The forward chain admits no skipping; `TornDown` is reachable
    /// from everywhere.
    pub fn permits(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Init, ResourcesUp)
                | (ResourcesUp, BaselineVerified)
                | (BaselineVerified, LoadInjected)
                | (LoadInjected, ScaledUpVerified)
                | (ScaledUpVerified, LoadDrained)
                | (LoadDrained, ScaledDownVerified)
                | (_, TornDown)
        )
    }
}

/// Runs one scenario against a control plane and a queue service.
///
/// Both clients are constructed by the caller and borrowed for the
/// scenario's lifetime; the runner holds no connection state of its
/// own.
pub struct ScenarioRunner<'a, C, Q>
where
    C: ControlPlane,
    Q: QueueAdmin + QueueData,
{
    cluster: &'a C,
    queue: &'a Q,
    config: HarnessConfig,
    credential: String,
    phase: Phase,
}

impl<'a, C, Q> ScenarioRunner<'a, C, Q>
where
    C: ControlPlane,
    Q: QueueAdmin + QueueData,
{
    pub fn new(cluster: &'a C, queue: &'a Q, config: HarnessConfig, credential: String) -> Self {
        Self {
            cluster,
            queue,
            config,
            credential,
            phase: Phase::Init,
        }
    }

    /// Move to the next phase, enforcing the transition rules.
    ///
    /// Stage code may only reach a phase from its predecessor (or
    /// `TornDown` from anywhere); an illegal transition is a harness
    /// bug, not a scenario failure.
    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.permits(next),
            "illegal phase transition {:?} -> {next:?}",
            self.phase,
        );
        self.phase = next;
    }

    /// Execute the scenario and return its verdict.
    ///
    /// Teardown runs exactly once, regardless of whether setup or any
    /// assertion failed.
    pub async fn run(mut self) -> ScenarioReport {
        let scenario = Scenario::new(&self.config.scenario);
        let trigger = QueueTriggerConfig::from_harness(&self.config, &scenario);
        let poll = PollConfig::new(self.config.max_wait(), self.config.poll_interval());
        let driver = LoadDriver::new(self.queue, &trigger.topic, &trigger.subscription);
        let mut lifecycle = LifecycleManager::new(self.cluster);

        info!(scenario = %scenario.name(), "scenario starting");
        let mut stages: Vec<StageReport> = Vec::new();
        let mut failed = false;

        // Setup: queue entities, then cluster resources in
        // dependency order.
        {
            let started = Instant::now();
            let outcome = match self.setup(&scenario, &trigger, &mut lifecycle).await {
                Ok(()) => {
                    self.advance(Phase::ResourcesUp);
                    StageOutcome::Passed { observed: None }
                }
                Err(e) => {
                    error!(error = %e, "setup failed, skipping to teardown");
                    failed = true;
                    StageOutcome::Failed {
                        observed: None,
                        reason: e.to_string(),
                    }
                }
            };
            stages.push(stage_report(Stage::Setup, outcome, started));
        }

        // Baseline: the workload must settle at the lower bound
        // before load means anything.
        self.assertion_stage(
            &mut stages,
            &mut failed,
            Stage::Baseline,
            &scenario,
            trigger.min_replicas,
            poll,
            Phase::BaselineVerified,
        )
        .await;

        // Inject load.
        if failed {
            stages.push(skipped(Stage::Inject));
        } else {
            let started = Instant::now();
            let outcome = match driver.inject(self.config.message_count).await {
                Ok(sent) => {
                    self.advance(Phase::LoadInjected);
                    StageOutcome::Passed {
                        observed: Some(sent as u64),
                    }
                }
                Err(e) => {
                    failed = true;
                    StageOutcome::Failed {
                        observed: None,
                        reason: e.to_string(),
                    }
                }
            };
            stages.push(stage_report(Stage::Inject, outcome, started));
        }

        // Scale up under load.
        self.assertion_stage(
            &mut stages,
            &mut failed,
            Stage::ScaleUp,
            &scenario,
            trigger.max_replicas,
            poll,
            Phase::ScaledUpVerified,
        )
        .await;

        // Drain the load back out.
        if failed {
            stages.push(skipped(Stage::Drain));
        } else {
            let started = Instant::now();
            let target = self.config.message_count;
            let outcome = match driver.drain(target, self.config.max_wait()).await {
                Ok(drained) if drained >= target => {
                    self.advance(Phase::LoadDrained);
                    StageOutcome::Passed {
                        observed: Some(drained as u64),
                    }
                }
                Ok(drained) => {
                    failed = true;
                    StageOutcome::Failed {
                        observed: Some(drained as u64),
                        reason: format!("drained {drained} of {target} before deadline"),
                    }
                }
                Err(e) => {
                    failed = true;
                    StageOutcome::Failed {
                        observed: None,
                        reason: e.to_string(),
                    }
                }
            };
            stages.push(stage_report(Stage::Drain, outcome, started));
        }

        // Scale back down once the queue is empty.
        self.assertion_stage(
            &mut stages,
            &mut failed,
            Stage::ScaleDown,
            &scenario,
            trigger.min_replicas,
            poll,
            Phase::ScaledDownVerified,
        )
        .await;

        // Teardown runs unconditionally.
        let started = Instant::now();
        let teardown_errors = self.teardown(&scenario, &mut lifecycle).await;
        self.advance(Phase::TornDown);
        let outcome = if teardown_errors.is_empty() {
            StageOutcome::Passed { observed: None }
        } else {
            // Reported, but never part of the verdict.
            StageOutcome::Failed {
                observed: None,
                reason: format!("{} teardown step(s) failed", teardown_errors.len()),
            }
        };
        stages.push(stage_report(Stage::Teardown, outcome, started));

        let passed = stages
            .iter()
            .filter(|r| r.stage != Stage::Teardown)
            .all(|r| r.outcome.passed());
        info!(passed, "scenario finished");

        ScenarioReport {
            scenario: scenario.name().to_string(),
            stages,
            passed,
            phase: self.phase,
            teardown_errors,
        }
    }

    async fn setup(
        &self,
        scenario: &Scenario,
        trigger: &QueueTriggerConfig,
        lifecycle: &mut LifecycleManager<'a, C>,
    ) -> anyhow::Result<()> {
        trigger.validate()?;

        // Fresh queue entities per run; a leftover topic from an
        // earlier run is replaced.
        if self.queue.topic_exists(&trigger.topic).await? {
            self.queue.delete_topic(&trigger.topic).await?;
        }
        self.queue.create_topic(&trigger.topic).await?;
        self.queue
            .create_subscription(&trigger.topic, &trigger.subscription)
            .await?;

        // Dependency order: namespace, secret, workload, auth
        // binding, scaling policy.
        let ns = scenario.namespace();
        lifecycle
            .create(ResourceSpec::new(
                ResourceRecord::cluster_scoped(ResourceKind::Namespace, &ns),
                manifest::namespace(scenario),
            ))
            .await?;
        lifecycle
            .create(ResourceSpec::new(
                ResourceRecord::namespaced(ResourceKind::Secret, &scenario.secret(), &ns),
                manifest::secret(scenario, &self.credential),
            ))
            .await?;
        lifecycle
            .create(ResourceSpec::new(
                ResourceRecord::namespaced(ResourceKind::Deployment, &scenario.workload(), &ns),
                manifest::deployment(scenario, &self.config.workload_image),
            ))
            .await?;
        lifecycle
            .create(ResourceSpec::new(
                ResourceRecord::namespaced(
                    ResourceKind::TriggerAuthentication,
                    &scenario.trigger_auth(),
                    &ns,
                ),
                manifest::trigger_authentication(scenario),
            ))
            .await?;
        lifecycle
            .create(ResourceSpec::new(
                ResourceRecord::namespaced(
                    ResourceKind::ScaledObject,
                    &scenario.scaled_object(),
                    &ns,
                ),
                manifest::scaled_object(scenario, trigger),
            ))
            .await?;
        Ok(())
    }

    /// Run one replica-count assertion as a stage, advancing the
    /// phase on success.
    #[allow(clippy::too_many_arguments)]
    async fn assertion_stage(
        &mut self,
        stages: &mut Vec<StageReport>,
        failed: &mut bool,
        stage: Stage,
        scenario: &Scenario,
        expected: u32,
        poll: PollConfig,
        next_phase: Phase,
    ) {
        if *failed {
            stages.push(skipped(stage));
            return;
        }

        let started = Instant::now();
        let workload = scenario.workload();
        let namespace = scenario.namespace();
        let observe = || async { Ok(self.cluster.replica_count(&workload, &namespace).await?) };

        let outcome = wait_for(observe, |count| *count == expected, poll).await;
        let report = if outcome.satisfied {
            self.advance(next_phase);
            StageOutcome::Passed {
                observed: outcome.last_observed.map(u64::from),
            }
        } else {
            *failed = true;
            StageOutcome::Failed {
                observed: outcome.last_observed.map(u64::from),
                reason: format!(
                    "replica count did not reach {expected} within {}s",
                    poll.max_wait.as_secs(),
                ),
            }
        };
        stages.push(stage_report(stage, report, started));
    }

    /// Best-effort, exhaustive release of everything the scenario
    /// created: cluster resources first, then queue entities.
    async fn teardown(
        &self,
        scenario: &Scenario,
        lifecycle: &mut LifecycleManager<'a, C>,
    ) -> Vec<String> {
        let mut errors: Vec<String> = lifecycle
            .teardown()
            .await
            .iter()
            .map(ToString::to_string)
            .collect();

        match self
            .queue
            .delete_subscription(&scenario.topic(), &scenario.subscription())
            .await
        {
            Ok(200) => {}
            Ok(code) => errors.push(format!("delete_subscription returned status {code}")),
            Err(e) => errors.push(format!("delete_subscription failed: {e}")),
        }
        match self.queue.delete_topic(&scenario.topic()).await {
            Ok(200) => {}
            Ok(code) => errors.push(format!("delete_topic returned status {code}")),
            Err(e) => errors.push(format!("delete_topic failed: {e}")),
        }
        errors
    }
}

fn stage_report(stage: Stage, outcome: StageOutcome, started: Instant) -> StageReport {
    StageReport {
        stage,
        outcome,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

fn skipped(stage: Stage) -> StageReport {
    StageReport {
        stage,
        outcome: StageOutcome::Skipped,
        elapsed_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD_CHAIN: [Phase; 7] = [
        Phase::Init,
        Phase::ResourcesUp,
        Phase::BaselineVerified,
        Phase::LoadInjected,
        Phase::ScaledUpVerified,
        Phase::LoadDrained,
        Phase::ScaledDownVerified,
    ];

    #[test]
    fn every_forward_step_is_permitted() {
        for pair in FORWARD_CHAIN.windows(2) {
            assert!(pair[0].permits(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        assert!(!Phase::Init.permits(Phase::BaselineVerified));
        assert!(!Phase::BaselineVerified.permits(Phase::ScaledUpVerified));
        assert!(!Phase::LoadInjected.permits(Phase::LoadDrained));
    }

    #[test]
    fn moving_backward_is_rejected() {
        assert!(!Phase::ScaledUpVerified.permits(Phase::LoadInjected));
        assert!(!Phase::TornDown.permits(Phase::Init));
    }

    #[test]
    fn teardown_is_reachable_from_every_phase() {
        for phase in FORWARD_CHAIN {
            assert!(phase.permits(Phase::TornDown), "{phase:?}");
        }
        assert!(Phase::TornDown.permits(Phase::TornDown));
    }
}
