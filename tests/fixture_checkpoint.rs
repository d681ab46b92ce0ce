use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use veritor::{
    discover, FaultKind, RunConfig, Runner, Suite, TestFault, TestStatus,
};

struct Lifecycle {
    setups: AtomicU64,
    teardowns: AtomicU64,
}

impl Lifecycle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            setups: AtomicU64::new(0),
            teardowns: AtomicU64::new(0),
        })
    }
}

#[test]
fn fixture_checkpoint_teardown_runs_exactly_once_per_outcome() {
    let passing = Lifecycle::new();
    let failing = Lifecycle::new();
    let panicking = Lifecycle::new();
    let hanging = Lifecycle::new();

    let suite = Suite::new()
        .with_fixture_case(
            "outcomes",
            "passes",
            {
                let lc = passing.clone();
                move |_cx| {
                    lc.setups.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            {
                let lc = passing.clone();
                move |_cx| {
                    lc.teardowns.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |cx| {
                cx.assert_true(true, None)?;
                Ok(())
            },
        )
        .with_fixture_case(
            "outcomes",
            "fails_an_assertion",
            {
                let lc = failing.clone();
                move |_cx| {
                    lc.setups.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            {
                let lc = failing.clone();
                move |_cx| {
                    lc.teardowns.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |cx| {
                cx.assert_equal(1, 2, None)?;
                Ok(())
            },
        )
        .with_fixture_case(
            "outcomes",
            "panics",
            {
                let lc = panicking.clone();
                move |_cx| {
                    lc.setups.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            {
                let lc = panicking.clone();
                move |_cx| {
                    lc.teardowns.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |_cx| panic!("unexpected"),
        )
        .with_fixture_case(
            "outcomes",
            "hangs",
            {
                let lc = hanging.clone();
                move |_cx| {
                    lc.setups.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            {
                let lc = hanging.clone();
                move |_cx| {
                    lc.teardowns.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            |_cx| {
                thread::sleep(Duration::from_millis(400));
                Ok(())
            },
        );

    let runner = Runner::new(
        RunConfig::default()
            .with_test_timeout(Duration::from_millis(60))
            .with_teardown_grace(Duration::from_secs(2)),
    );
    let report = runner.run(discover(&suite).unwrap());
    assert_eq!(report.results.len(), 4);

    for lc in [&passing, &failing, &panicking, &hanging] {
        assert_eq!(lc.setups.load(Ordering::SeqCst), 1);
        assert_eq!(lc.teardowns.load(Ordering::SeqCst), 1);
    }

    assert_eq!(report.results[0].status, TestStatus::Passed);
    assert_eq!(report.results[1].status, TestStatus::Failed);
    assert_eq!(report.results[2].status, TestStatus::Failed);
    assert_eq!(report.results[3].status, TestStatus::Failed);
    assert_eq!(
        report.results[3].fault.as_ref().unwrap().kind(),
        FaultKind::Timeout
    );
}

#[test]
fn fixture_checkpoint_counter_scenario_with_unrelated_fault() {
    let counter = Arc::new(AtomicU64::new(0));
    let in_setup = counter.clone();
    let in_body = counter.clone();
    let in_teardown = counter.clone();

    let suite = Suite::new().with_fixture_case(
        "counter",
        "body_faults_after_asserting",
        move |_cx| {
            in_setup.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        move |_cx| {
            in_teardown.store(0, Ordering::SeqCst);
            Ok(())
        },
        move |cx| {
            cx.assert_equal(1, in_body.load(Ordering::SeqCst) as i64, None)?;
            Err(TestFault::uncaught("unrelated collaborator exploded"))
        },
    );

    let report = Runner::new(RunConfig::default()).run(discover(&suite).unwrap());
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Failed);
    let fault = result.fault.as_ref().unwrap();
    assert_eq!(fault.kind(), FaultKind::UncaughtFault);
    assert!(fault.to_string().contains("unrelated collaborator exploded"));
    // tear-down observed: the counter was reset
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn fixture_checkpoint_setup_fault_is_attached_not_swallowed() {
    let teardowns = Arc::new(AtomicU64::new(0));
    let in_teardown = teardowns.clone();
    let suite = Suite::new().with_fixture_case(
        "broken",
        "setup_faults",
        |_cx| Err(TestFault::uncaught("database refused to open")),
        move |_cx| {
            in_teardown.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        |cx| {
            cx.assert_true(true, None)?;
            Ok(())
        },
    );

    let report = Runner::new(RunConfig::default()).run(discover(&suite).unwrap());
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Failed);
    let fault = result.fault.as_ref().unwrap();
    assert_eq!(fault.kind(), FaultKind::FixtureFault);
    assert!(fault.to_string().contains("database refused to open"));
    // body never ran, paired tear-down still did
    assert_eq!(result.assertions_evaluated, 0);
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn fixture_checkpoint_body_and_teardown_faults_both_preserved() {
    let suite = Suite::new().with_fixture_case(
        "both",
        "double_fault",
        |_cx| Ok(()),
        |_cx| Err(TestFault::uncaught("release failed")),
        |_cx| Err(TestFault::uncaught("primary fault")),
    );
    let report = Runner::new(RunConfig::default()).run(discover(&suite).unwrap());
    let result = &report.results[0];
    assert_eq!(result.status, TestStatus::Failed);
    assert!(result
        .fault
        .as_ref()
        .unwrap()
        .to_string()
        .contains("primary fault"));
    let teardown = result.teardown_fault.as_ref().unwrap();
    assert_eq!(teardown.kind(), FaultKind::FixtureFault);
    assert!(teardown.to_string().contains("release failed"));
}

#[test]
fn fixture_checkpoint_shared_group_runs_lifecycle_once() {
    let lifecycle = Lifecycle::new();
    let in_setup = lifecycle.clone();
    let in_teardown = lifecycle.clone();

    let mut suite = Suite::new().with_group_fixture(
        "warehouse",
        move |cx| {
            in_setup.setups.fetch_add(1, Ordering::SeqCst);
            cx.shared().put("connection", 41);
            Ok(())
        },
        move |_cx| {
            in_teardown.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );
    for idx in 0..3 {
        suite = suite.with_case("warehouse", format!("case_{idx}"), |cx| {
            let handle = cx.shared().get("connection");
            cx.assert_equal(41, handle.unwrap_or(veritor::Value::Unit), None)?;
            Ok(())
        });
    }

    let runner = Runner::new(RunConfig::default().with_concurrency_limit(4));
    let report = runner.run(discover(&suite).unwrap());

    assert!(report.results.iter().all(|r| r.status == TestStatus::Passed));
    assert_eq!(lifecycle.setups.load(Ordering::SeqCst), 1);
    assert_eq!(lifecycle.teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn fixture_checkpoint_shared_setup_fault_fails_every_case() {
    let teardowns = Arc::new(AtomicU64::new(0));
    let in_teardown = teardowns.clone();
    let suite = Suite::new()
        .with_group_fixture(
            "doomed",
            |_cx| Err(TestFault::uncaught("shared resource missing")),
            move |_cx| {
                in_teardown.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .with_case("doomed", "first", |cx| {
            cx.assert_true(true, None)?;
            Ok(())
        })
        .with_case("doomed", "second", |cx| {
            cx.assert_true(true, None)?;
            Ok(())
        });

    let report = Runner::new(RunConfig::default()).run(discover(&suite).unwrap());
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(
            result.fault.as_ref().unwrap().kind(),
            FaultKind::FixtureFault
        );
    }
    // symmetric release still attempted once
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}
