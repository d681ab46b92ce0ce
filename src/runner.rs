//! Test runner: orchestrates fixtures and execution, aggregates results.
//!
//! Units execute on a pool of worker threads bounded by the configured
//! concurrency limit; a limit of 1 degrades to fully sequential execution.
//! Each unit body runs on its own thread so a hung body can be timed out
//! without taking the worker down; the stuck thread is abandoned and its
//! tear-down is attempted on a fresh thread bounded by the tear-down grace
//! period. Whatever the interleaving, results are reported in discovery
//! order and every discovered unit yields exactly one result.

use crate::config::RunConfig;
use crate::context::{SlotStore, TestContext};
use crate::fault::{FaultKind, FixturePhase, TestFault};
use crate::fixture::{
    call_guarded, run_with_fixture, wrap_fixture_fault, Fixture, TeardownClaim,
};
use crate::report::{RunReport, TestResult};
use crate::telemetry::MetricsRegistry;
use crate::unit::{TestStatus, TestUnit, UnitName};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub struct Runner {
    config: RunConfig,
}

/// One schedulable piece of work: either a lone unit, or a whole
/// shared-fixture group that must stay on one worker so its set-up and
/// tear-down run once.
enum Task {
    Single(usize),
    Group(Vec<usize>),
}

struct UnitOutcome {
    setup_fault: Option<TestFault>,
    body_result: Option<Result<(), TestFault>>,
    teardown_fault: Option<TestFault>,
    assertions: u32,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn run(&self, units: Vec<TestUnit>) -> RunReport {
        let mut metrics = MetricsRegistry::new("veritor");
        self.run_with_metrics(units, &mut metrics)
    }

    pub fn run_with_metrics(
        &self,
        units: Vec<TestUnit>,
        metrics: &mut MetricsRegistry,
    ) -> RunReport {
        let started = Instant::now();
        let deadline = self.config.run_deadline.map(|limit| started + limit);
        let total = units.len();
        info!(
            "starting run: {} unit(s), concurrency limit {}",
            total, self.config.concurrency_limit
        );
        metrics.set_gauge("runner.concurrency_limit", self.config.concurrency_limit as u64);

        if units.is_empty() {
            return RunReport {
                results: Vec::new(),
                elapsed: started.elapsed(),
            };
        }

        let tasks = self.build_tasks(&units);
        let worker_count = self.config.concurrency_limit.min(tasks.len()).max(1);
        let queue = Arc::new(Mutex::new(tasks));
        let slots: Arc<Mutex<Vec<Option<TestUnit>>>> =
            Arc::new(Mutex::new(units.into_iter().map(Some).collect()));
        let (result_tx, result_rx) = mpsc::channel::<(usize, TestResult)>();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_idx in 0..worker_count {
            let queue = queue.clone();
            let slots = slots.clone();
            let result_tx = result_tx.clone();
            let config = self.config.clone();
            let builder = thread::Builder::new().name(format!("veritor-worker-{worker_idx}"));
            let handle = builder.spawn(move || loop {
                let task = match queue.lock().pop_front() {
                    Some(task) => task,
                    None => break,
                };
                match task {
                    Task::Single(index) => {
                        let unit = slots.lock()[index]
                            .take()
                            .expect("unit scheduled exactly once");
                        let result = execute_unit(&config, deadline, unit, None);
                        let _ = result_tx.send((index, result));
                    }
                    Task::Group(indices) => {
                        let group_units: Vec<(usize, TestUnit)> = {
                            let mut slots = slots.lock();
                            indices
                                .iter()
                                .map(|&index| {
                                    (
                                        index,
                                        slots[index].take().expect("unit scheduled exactly once"),
                                    )
                                })
                                .collect()
                        };
                        for (index, result) in execute_group(&config, deadline, group_units) {
                            let _ = result_tx.send((index, result));
                        }
                    }
                }
            });
            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => warn!("failed to spawn worker thread: {err}"),
            }
        }
        drop(result_tx);

        let mut collected: Vec<Option<TestResult>> = (0..total).map(|_| None).collect();
        for (index, result) in result_rx {
            record_metrics(metrics, &result);
            collected[index] = Some(result);
        }
        for handle in workers {
            let _ = handle.join();
        }

        let results: Vec<TestResult> = collected
            .into_iter()
            .map(|slot| slot.expect("every unit reports exactly one result"))
            .collect();
        let report = RunReport {
            results,
            elapsed: started.elapsed(),
        };
        let summary = report.summary();
        info!(
            "run finished in {:?}: {} passed, {} failed, {} inconclusive",
            report.elapsed, summary.passed, summary.failed, summary.inconclusive
        );
        report
    }

    /// Shared-fixture groups become one task each, keeping their lifecycle
    /// on a single worker; everything else schedules independently. The
    /// optional shuffle reorders execution only, never reporting.
    fn build_tasks(&self, units: &[TestUnit]) -> VecDeque<Task> {
        let mut tasks = Vec::new();
        let mut open_groups: Vec<(String, usize)> = Vec::new();
        for (index, unit) in units.iter().enumerate() {
            if unit.fixture().is_shared() {
                let group = unit.name().group.clone();
                match open_groups.iter().find(|(name, _)| *name == group) {
                    Some(&(_, task_idx)) => {
                        if let Task::Group(indices) = &mut tasks[task_idx] {
                            indices.push(index);
                        }
                    }
                    None => {
                        open_groups.push((group, tasks.len()));
                        tasks.push(Task::Group(vec![index]));
                    }
                }
            } else {
                tasks.push(Task::Single(index));
            }
        }
        if let Some(seed) = self.config.shuffle_seed {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            tasks.shuffle(&mut rng);
            debug!("execution schedule shuffled with seed {seed}");
        }
        tasks.into()
    }
}

fn record_metrics(metrics: &mut MetricsRegistry, result: &TestResult) {
    metrics.inc_counter("runner.units_total", 1);
    match result.status {
        TestStatus::Passed => metrics.inc_counter("runner.passed", 1),
        TestStatus::Failed => metrics.inc_counter("runner.failed", 1),
        TestStatus::Inconclusive => metrics.inc_counter("runner.inconclusive", 1),
        TestStatus::Pending | TestStatus::Running => 0,
    };
    if matches!(&result.fault, Some(fault) if fault.kind() == FaultKind::Timeout) {
        metrics.inc_counter("runner.timeouts", 1);
    }
    metrics.observe_duration("runner.unit_elapsed", result.elapsed);
}

/// Remaining budget before the run deadline, if one is set.
fn remaining_budget(deadline: Option<Instant>, now: Instant) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(now))
}

fn deadline_expired_result(mut unit: TestUnit) -> TestResult {
    warn!(
        "unit {} not started: run deadline already passed",
        unit.name()
    );
    unit.transition(TestStatus::Running);
    unit.transition(TestStatus::Failed);
    TestResult {
        name: unit.name().clone(),
        status: TestStatus::Failed,
        elapsed: Duration::ZERO,
        failures: Vec::new(),
        fault: Some(TestFault::Timeout { limit_ms: 0 }),
        teardown_fault: None,
        assertions_evaluated: 0,
    }
}

fn execute_unit(
    config: &RunConfig,
    deadline: Option<Instant>,
    mut unit: TestUnit,
    shared: Option<Arc<SlotStore>>,
) -> TestResult {
    let now = Instant::now();
    let remaining = remaining_budget(deadline, now);
    if matches!(remaining, Some(rem) if rem.is_zero()) {
        return deadline_expired_result(unit);
    }
    let effective_timeout = match remaining {
        Some(rem) => config.test_timeout.min(rem),
        None => config.test_timeout,
    };

    unit.transition(TestStatus::Running);
    let name = unit.name().clone();
    let body = unit.body().clone();
    let fixture = unit.fixture().clone();
    let claim = TeardownClaim::new();
    let started = Instant::now();

    let (outcome_tx, outcome_rx) = mpsc::channel::<UnitOutcome>();
    let spawn = {
        let fixture = fixture.clone();
        let claim = claim.clone();
        let shared = shared.clone();
        thread::Builder::new()
            .name(format!("veritor-unit-{name}"))
            .spawn(move || {
                let mut cx = match shared {
                    Some(slots) => TestContext::with_shared(slots),
                    None => TestContext::new(),
                };
                let fixture_outcome = run_with_fixture(&fixture, &mut cx, &body, &claim);
                let _ = outcome_tx.send(UnitOutcome {
                    setup_fault: fixture_outcome.setup_fault,
                    body_result: fixture_outcome.body_result,
                    teardown_fault: fixture_outcome.teardown_fault,
                    assertions: cx.assertions_evaluated(),
                });
            })
    };
    if let Err(err) = spawn {
        unit.transition(TestStatus::Failed);
        return TestResult {
            name,
            status: TestStatus::Failed,
            elapsed: started.elapsed(),
            failures: Vec::new(),
            fault: Some(TestFault::uncaught(format!(
                "failed to spawn execution thread: {err}"
            ))),
            teardown_fault: None,
            assertions_evaluated: 0,
        };
    }

    match outcome_rx.recv_timeout(effective_timeout) {
        Ok(outcome) => assemble_result(unit, outcome, started.elapsed()),
        Err(RecvTimeoutError::Timeout) => {
            warn!("unit {name} exceeded {effective_timeout:?}, abandoning its thread");
            let teardown_fault = recover_teardown(
                config,
                &name,
                &fixture,
                &claim,
                shared,
                &outcome_rx,
            );
            unit.transition(TestStatus::Failed);
            TestResult {
                name,
                status: TestStatus::Failed,
                elapsed: started.elapsed(),
                failures: Vec::new(),
                fault: Some(TestFault::Timeout {
                    limit_ms: effective_timeout.as_millis() as u64,
                }),
                teardown_fault,
                assertions_evaluated: 0,
            }
        }
        Err(RecvTimeoutError::Disconnected) => {
            unit.transition(TestStatus::Failed);
            TestResult {
                name,
                status: TestStatus::Failed,
                elapsed: started.elapsed(),
                failures: Vec::new(),
                fault: Some(TestFault::uncaught(
                    "execution thread terminated without reporting",
                )),
                teardown_fault: None,
                assertions_evaluated: 0,
            }
        }
    }
}

/// Best-effort tear-down after a timeout. If the abandoned thread has not
/// claimed the tear-down, run it on a fresh thread bounded by the grace
/// period; if it has, wait out the grace period for its report instead.
fn recover_teardown(
    config: &RunConfig,
    name: &UnitName,
    fixture: &Fixture,
    claim: &TeardownClaim,
    shared: Option<Arc<SlotStore>>,
    outcome_rx: &mpsc::Receiver<UnitOutcome>,
) -> Option<TestFault> {
    let tear_down = fixture.tear_down.clone()?;
    if claim.claim() {
        let (done_tx, done_rx) = mpsc::channel::<Result<(), TestFault>>();
        let spawn = thread::Builder::new()
            .name(format!("veritor-teardown-{name}"))
            .spawn(move || {
                let mut cx = match shared {
                    Some(slots) => TestContext::with_shared(slots),
                    None => TestContext::new(),
                };
                let _ = done_tx.send(call_guarded(&tear_down, &mut cx));
            });
        if spawn.is_err() {
            warn!("unit {name}: could not spawn tear-down recovery thread");
            return None;
        }
        match done_rx.recv_timeout(config.teardown_grace) {
            Ok(Ok(())) => None,
            Ok(Err(fault)) => Some(wrap_fixture_fault(FixturePhase::TearDown, &fault)),
            Err(_) => {
                warn!(
                    "unit {name}: tear-down did not finish within {:?}",
                    config.teardown_grace
                );
                None
            }
        }
    } else {
        // The abandoned thread reached tear-down on its own; give it the
        // grace period to report.
        match outcome_rx.recv_timeout(config.teardown_grace) {
            Ok(outcome) => outcome.teardown_fault,
            Err(_) => None,
        }
    }
}

fn assemble_result(mut unit: TestUnit, outcome: UnitOutcome, elapsed: Duration) -> TestResult {
    let mut failures = Vec::new();
    let mut fault = None;

    let mut status = if let Some(setup_fault) = outcome.setup_fault {
        fault = Some(setup_fault);
        TestStatus::Failed
    } else {
        match outcome
            .body_result
            .expect("body runs whenever set-up succeeds")
        {
            Ok(()) => {
                if outcome.assertions == 0 {
                    TestStatus::Inconclusive
                } else {
                    TestStatus::Passed
                }
            }
            Err(TestFault::Assertion(failure)) => {
                failures.push(failure);
                TestStatus::Failed
            }
            Err(other) => {
                fault = Some(other);
                TestStatus::Failed
            }
        }
    };

    if outcome.teardown_fault.is_some() && status != TestStatus::Failed {
        status = TestStatus::Failed;
    }

    unit.transition(status);
    TestResult {
        name: unit.name().clone(),
        status,
        elapsed,
        failures,
        fault,
        teardown_fault: outcome.teardown_fault,
        assertions_evaluated: outcome.assertions,
    }
}

/// Runs a shared-fixture group sequentially: set-up once, every case body,
/// tear-down once. A set-up fault fails every case of the group; a
/// tear-down fault is appended to the group's last result.
fn execute_group(
    config: &RunConfig,
    deadline: Option<Instant>,
    group_units: Vec<(usize, TestUnit)>,
) -> Vec<(usize, TestResult)> {
    let fixture = group_units
        .first()
        .map(|(_, unit)| unit.fixture().clone())
        .unwrap_or_default();
    let slots = Arc::new(SlotStore::default());

    let mut setup_fault = None;
    if let Some(set_up) = &fixture.set_up {
        let mut cx = TestContext::with_shared(slots.clone());
        if let Err(inner) = call_guarded(set_up, &mut cx) {
            let wrapped = wrap_fixture_fault(FixturePhase::SetUp, &inner);
            warn!("shared fixture set-up failed: {wrapped}");
            setup_fault = Some(wrapped);
        }
    }

    let mut results = Vec::with_capacity(group_units.len());
    for (index, mut unit) in group_units {
        if let Some(fault) = &setup_fault {
            unit.transition(TestStatus::Running);
            unit.transition(TestStatus::Failed);
            results.push((
                index,
                TestResult {
                    name: unit.name().clone(),
                    status: TestStatus::Failed,
                    elapsed: Duration::ZERO,
                    failures: Vec::new(),
                    fault: Some(fault.clone()),
                    teardown_fault: None,
                    assertions_evaluated: 0,
                },
            ));
            continue;
        }
        // the group fixture already ran; member cases execute body-only
        unit.strip_fixture();
        let result = execute_unit(config, deadline, unit, Some(slots.clone()));
        results.push((index, result));
    }

    if let Some(tear_down) = &fixture.tear_down {
        let mut cx = TestContext::with_shared(slots);
        if let Err(inner) = call_guarded(tear_down, &mut cx) {
            let wrapped = wrap_fixture_fault(FixturePhase::TearDown, &inner);
            warn!("shared fixture tear-down failed: {wrapped}");
            if let Some((_, last)) = results.last_mut() {
                last.teardown_fault = Some(wrapped);
                if last.status != TestStatus::Failed {
                    last.status = TestStatus::Failed;
                }
            }
        }
    }

    results
}
