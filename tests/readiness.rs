// tests/readiness.rs

mod common;
use crate::common::{issue, root, utc, ConfigFileBuilder, SourceBuilder, DATA_ROOT, STATE_FILE};

use std::sync::Arc;

use chrono::TimeDelta;

use forcewatch::config::ConfigFile;
use forcewatch::fs::mock::MockFileSystem;
use forcewatch::probe::FsProbe;
use forcewatch::tracker::{
    best_variant, classify, refresh_availability, ForcingPolicy, ForecastCycle, LeadStep,
    Readiness, Timing,
};
use forcewatch::types::{ActionKind, StepMode};
use forcewatch_test_utils::fixtures::put_forcing;

fn analysis_cfg() -> ConfigFile {
    ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
        .very_late_minutes(20)
        .build()
}

fn step_with(policy: &ForcingPolicy, available: &[&str]) -> LeadStep {
    let mut step = LeadStep::new(0, policy);
    for name in available {
        step.mark_available(name);
    }
    step
}

#[test]
fn test_expected_file_hours_back_mode_shifts_issue_time() {
    let cfg = ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
        .steps(&[0, -1, -2])
        .build();
    let policy = ForcingPolicy::from_config(&cfg);
    let hrrr3 = policy.inputs().find(|i| i.name == "hrrr3").expect("hrrr3");

    let f = policy.expected_file(hrrr3, issue("2024010100"), -2);

    assert_eq!(f.issue, issue("2023123119"));
    assert_eq!(f.valid, utc("2023123122"));
    assert_eq!(
        f.path(),
        root("hrrr3")
            .join("2023123119")
            .join("202312312200.LDASIN_DOMAIN1.nc")
    );
}

#[test]
fn test_expected_file_lead_hour_mode_shifts_valid_time() {
    let cfg = ConfigFileBuilder::short_range(DATA_ROOT, STATE_FILE, 18).build();
    let policy = ForcingPolicy::from_config(&cfg);
    assert_eq!(policy.step_mode, StepMode::LeadHour);
    let hrrr = policy.inputs().find(|i| i.name == "hrrr").expect("hrrr");

    let f = policy.expected_file(hrrr, issue("2024010112"), 7);

    assert_eq!(f.issue, issue("2024010112"));
    assert_eq!(f.file_name, "202401011900.LDASIN_DOMAIN1.nc");
}

#[test]
fn test_sources_are_ordered_by_priority_then_name() {
    let cfg = ConfigFileBuilder::new(STATE_FILE)
        .with_source("zeta", SourceBuilder::new(5).input("z", "/z", 0, 0).build())
        .with_source("alpha", SourceBuilder::new(5).input("a", "/a", 0, 0).build())
        .with_source("prime", SourceBuilder::new(1).input("p", "/p", 0, 0).build())
        .build();

    let policy = ForcingPolicy::from_config(&cfg);
    let names: Vec<_> = policy.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["prime", "alpha", "zeta"]);
}

#[test]
fn test_classify_partial_then_timed_out_after_very_late() {
    let policy = ForcingPolicy::from_config(&analysis_cfg());
    let timing = Timing::from_config(&analysis_cfg().config);
    let now = utc("2024010101");

    let mut cycle = ForecastCycle::open(issue("2024010100"), &policy, now);
    let step = step_with(&policy, &["hrrr0", "hrrr3"]);

    cycle.first_input_clock_time = Some(now);
    assert_eq!(
        classify(&cycle, &step, &policy, &timing, now),
        Readiness::PartiallyReady
    );

    cycle.first_input_clock_time = Some(now - TimeDelta::seconds(1200 + 1));
    assert_eq!(
        classify(&cycle, &step, &policy, &timing, now),
        Readiness::TimedOut
    );

    // Exactly at the threshold is not late yet.
    cycle.first_input_clock_time = Some(now - TimeDelta::seconds(1200));
    assert_eq!(
        classify(&cycle, &step, &policy, &timing, now),
        Readiness::PartiallyReady
    );
}

#[test]
fn test_classify_not_ready_when_no_source_complete() {
    let policy = ForcingPolicy::from_config(&analysis_cfg());
    let timing = Timing::from_config(&analysis_cfg().config);
    let now = utc("2024010101");
    let mut cycle = ForecastCycle::open(issue("2024010100"), &policy, now);
    cycle.first_input_clock_time = Some(now);

    let step = step_with(&policy, &["hrrr0", "rap3"]);
    assert_eq!(
        classify(&cycle, &step, &policy, &timing, now),
        Readiness::NotReady
    );

    let full = step_with(&policy, &["hrrr0", "hrrr3", "rap0", "rap3", "mrms"]);
    assert_eq!(
        classify(&cycle, &full, &policy, &timing, now),
        Readiness::FullyReady
    );
}

#[test]
fn test_classify_respects_min_sources_for_partial() {
    let cfg = ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
        .min_sources_for_partial(2)
        .build();
    let policy = ForcingPolicy::from_config(&cfg);
    let timing = Timing::from_config(&cfg.config);
    let now = utc("2024010101");
    let mut cycle = ForecastCycle::open(issue("2024010100"), &policy, now);
    cycle.first_input_clock_time = Some(now);

    let one = step_with(&policy, &["mrms"]);
    assert_eq!(classify(&cycle, &one, &policy, &timing, now), Readiness::NotReady);

    let two = step_with(&policy, &["mrms", "rap0", "rap3"]);
    assert_eq!(
        classify(&cycle, &two, &policy, &timing, now),
        Readiness::PartiallyReady
    );
}

#[test]
fn test_best_variant_prefers_more_sources_then_priority() {
    let policy = ForcingPolicy::from_config(&analysis_cfg());

    let v = best_variant(&step_with(&policy, &["rap0", "rap3", "mrms"]), &policy)
        .expect("two complete sources");
    assert_eq!(v.kind, ActionKind::DegradedTwoSource);
    assert_eq!(v.sources, vec!["RAP", "MRMS"]);

    let v = best_variant(&step_with(&policy, &["mrms"]), &policy).expect("one source");
    assert_eq!(v.kind, ActionKind::DegradedOneSource);
    assert_eq!(v.sources, vec!["MRMS"]);

    let v = best_variant(
        &step_with(&policy, &["hrrr0", "hrrr3", "rap0", "rap3", "mrms"]),
        &policy,
    )
    .expect("all sources");
    assert_eq!(v.kind, ActionKind::Full);

    assert!(best_variant(&step_with(&policy, &["hrrr0"]), &policy).is_none());
}

#[test]
fn test_best_variant_passthrough_when_flagged_source_is_alone() {
    let cfg = ConfigFileBuilder::short_range(DATA_ROOT, STATE_FILE, 0).build();
    let policy = ForcingPolicy::from_config(&cfg);
    let mut step = LeadStep::new(0, &policy);
    step.mark_available("rap");

    let v = best_variant(&step, &policy).expect("rap complete");
    assert_eq!(v.kind, ActionKind::Passthrough);
    assert_eq!(v.sources, vec!["RAP"]);
}

#[test]
fn test_refresh_is_monotonic_and_sets_first_seen_once() {
    let fs = MockFileSystem::new();
    let probe = FsProbe::new(Arc::new(fs.clone()));
    let policy = ForcingPolicy::from_config(&analysis_cfg());
    let cycle_issue = issue("2024010100");
    let mut step = LeadStep::new(0, &policy);
    let t0 = utc("2024010100");

    let report = refresh_availability(cycle_issue, &mut step, &policy, &probe, t0);
    assert!(report.arrived.is_empty());
    assert_eq!(step.first_seen_at, None);

    let path = put_forcing(&fs, &root("hrrr0"), "2024010100", "202401010000");
    let t1 = t0 + TimeDelta::minutes(2);
    let report = refresh_availability(cycle_issue, &mut step, &policy, &probe, t1);
    assert_eq!(report.arrived, vec!["hrrr0"]);
    assert!(report.step_clock_started);
    assert_eq!(step.first_seen_at, Some(t1));

    // The file vanishing does not reset the flag.
    use forcewatch::fs::FileSystem;
    fs.remove_file(&path).expect("remove");
    put_forcing(&fs, &root("mrms"), "2024010100", "202401010000");
    let t2 = t1 + TimeDelta::minutes(2);
    let report = refresh_availability(cycle_issue, &mut step, &policy, &probe, t2);
    assert_eq!(report.arrived, vec!["mrms"]);
    assert!(!report.step_clock_started);
    assert!(step.is_available("hrrr0"));
    assert_eq!(step.first_seen_at, Some(t1));
}

#[test]
fn test_refresh_leaves_dispatched_step_alone() {
    let fs = MockFileSystem::new();
    let probe = FsProbe::new(Arc::new(fs.clone()));
    let policy = ForcingPolicy::from_config(&analysis_cfg());
    let mut step = LeadStep::new(0, &policy);
    step.dispatched = true;

    put_forcing(&fs, &root("hrrr0"), "2024010100", "202401010000");
    let report = refresh_availability(issue("2024010100"), &mut step, &policy, &probe, utc("2024010100"));

    assert!(report.arrived.is_empty());
    assert!(!step.is_available("hrrr0"));
}

#[test]
fn test_probe_failure_counts_as_not_available() {
    let fs = MockFileSystem::new();
    let probe = FsProbe::new(Arc::new(fs.clone()));
    let policy = ForcingPolicy::from_config(&analysis_cfg());
    let mut step = LeadStep::new(0, &policy);

    put_forcing(&fs, &root("hrrr0"), "2024010100", "202401010000");
    fs.break_dir(root("hrrr0").join("2024010100"));

    let report = refresh_availability(issue("2024010100"), &mut step, &policy, &probe, utc("2024010100"));
    assert_eq!(report.probe_failures.len(), 1);
    assert_eq!(report.probe_failures[0].0, "hrrr0");
    assert!(!step.is_available("hrrr0"));

    fs.restore_dir(root("hrrr0").join("2024010100"));
    let report = refresh_availability(issue("2024010100"), &mut step, &policy, &probe, utc("2024010100"));
    assert!(report.probe_failures.is_empty());
    assert!(step.is_available("hrrr0"));
}

#[test]
fn test_cycle_clock_does_not_time_out_step_without_input() {
    let policy = ForcingPolicy::from_config(&analysis_cfg());
    let timing = Timing::from_config(&analysis_cfg().config);
    let now = utc("2024010103");
    let mut cycle = ForecastCycle::open(issue("2024010100"), &policy, now);
    cycle.first_input_clock_time = Some(now - TimeDelta::hours(2));

    let empty = step_with(&policy, &[]);
    assert_eq!(
        classify(&cycle, &empty, &policy, &timing, now),
        Readiness::NotReady
    );

    let incomplete = step_with(&policy, &["hrrr0"]);
    assert_eq!(
        classify(&cycle, &incomplete, &policy, &timing, now),
        Readiness::TimedOut
    );
}

#[test]
fn test_huge_timeouts_saturate_instead_of_overflowing() {
    let cfg = ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
        .very_late_minutes(u64::MAX)
        .max_wait_minutes(1_000_000_000_000_000)
        .build();
    let policy = ForcingPolicy::from_config(&cfg);
    let timing = Timing::from_config(&cfg.config);
    assert_eq!(timing.very_late, TimeDelta::MAX);
    assert_eq!(timing.max_wait, Some(TimeDelta::MAX));

    let now = utc("2024010101");
    let mut cycle = ForecastCycle::open(issue("2024010100"), &policy, now);
    cycle.first_input_clock_time = Some(utc("2024010100"));
    let mut step = step_with(&policy, &["hrrr0", "hrrr3"]);
    step.first_seen_at = Some(utc("2024010100"));

    assert_eq!(
        classify(&cycle, &step, &policy, &timing, now),
        Readiness::PartiallyReady
    );
}
