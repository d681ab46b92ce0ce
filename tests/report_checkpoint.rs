use tempfile::tempdir;
use veritor::{
    discover, JsonReportSink, MetricsRegistry, ReportSink, RunConfig, Runner, Suite, TestStatus,
};

fn mixed_suite() -> Suite {
    Suite::new()
        .with_case("report", "passes", |cx| {
            cx.assert_equal("ok", "ok", None)?;
            Ok(())
        })
        .with_case("report", "fails", |cx| {
            cx.assert_equal(1, 2, Some("counts"))?;
            Ok(())
        })
        .with_case("report", "undecided", |_cx| Ok(()))
}

#[test]
fn report_checkpoint_summary_is_computed_from_results() {
    let report = Runner::new(RunConfig::default()).run(discover(&mixed_suite()).unwrap());
    let summary = report.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.inconclusive, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].unit, "report::fails");
    assert!(summary.failures[0].detail.contains("counts"));
    assert!(!summary.all_passed());
}

#[test]
fn report_checkpoint_json_sink_persists_results_and_summary() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("artifacts").join("run.json");

    let report = Runner::new(RunConfig::default()).run(discover(&mixed_suite()).unwrap());
    let mut sink = JsonReportSink::new(&path);
    sink.consume(&report).unwrap();

    assert!(path.exists());
    let payload = std::fs::read(&path).unwrap();
    let document: serde_json::Value = serde_json::from_slice(&payload).unwrap();

    assert_eq!(document["summary"]["total"], 3);
    assert_eq!(document["summary"]["passed"], 1);
    assert_eq!(document["results"].as_array().unwrap().len(), 3);
    assert_eq!(document["results"][0]["status"], "Passed");
    assert_eq!(document["results"][1]["name"]["case"], "fails");
    assert!(document["results"][1]["failures"][0]["message"]
        .as_str()
        .unwrap()
        .contains("counts"));
}

#[test]
fn report_checkpoint_metrics_agree_with_summary() {
    let mut metrics = MetricsRegistry::new("veritor");
    let report = Runner::new(RunConfig::default())
        .run_with_metrics(discover(&mixed_suite()).unwrap(), &mut metrics);
    let summary = report.summary();

    assert_eq!(
        metrics.counter("runner.units_total"),
        (summary.passed + summary.failed + summary.inconclusive) as u64
    );
    assert_eq!(metrics.counter("runner.passed"), summary.passed as u64);
    assert_eq!(metrics.counter("runner.failed"), summary.failed as u64);
    assert_eq!(
        metrics.counter("runner.inconclusive"),
        summary.inconclusive as u64
    );

    let snapshot = metrics.snapshot();
    assert_eq!(
        snapshot.counters.get("veritor.runner.units_total"),
        Some(&3)
    );
}
