// tests/timeouts.rs

mod common;
use crate::common::{key, utc, ConfigFileBuilder, Harness, TestResult, DATA_ROOT, STATE_FILE};

use chrono::TimeDelta;

use forcewatch::dispatch::Outcome;
use forcewatch::types::ActionKind;

fn short_range_harness() -> Harness {
    Harness::new(
        ConfigFileBuilder::short_range(DATA_ROOT, STATE_FILE, 2)
            .very_late_minutes(60)
            .max_wait_minutes(5)
            .build(),
    )
}

#[tokio::test]
async fn test_max_wait_escalates_partial_step_to_passthrough() -> TestResult {
    let h = short_range_harness();
    h.put("rap", "2024010112", "202401011300");

    let t0 = utc("2024010112") + TimeDelta::minutes(30);
    let report = h.pass(t0).await;
    assert_eq!(report.outcome(&key("2024010112", 1)), Some(&Outcome::Skipped));
    assert_eq!(h.invoker.count(), 0);

    let report = h.pass(t0 + TimeDelta::minutes(6)).await;

    assert_eq!(
        report.outcome(&key("2024010112", 1)),
        Some(&Outcome::Dispatched(ActionKind::Passthrough))
    );
    // Steps without any input are not affected by max_wait.
    assert_eq!(report.outcome(&key("2024010112", 0)), Some(&Outcome::Skipped));
    assert_eq!(report.outcome(&key("2024010112", 2)), Some(&Outcome::Skipped));

    let requests = h.invoker.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sources, vec!["RAP"]);
    assert_eq!(requests[0].step, Some(1));
    assert_eq!(requests[0].valid, Some(utc("202401011300")));
    Ok(())
}

#[tokio::test]
async fn test_max_wait_counts_from_the_steps_own_first_input() -> TestResult {
    let h = short_range_harness();
    h.put("rap", "2024010112", "202401011200");
    let t0 = utc("2024010112") + TimeDelta::minutes(30);
    h.pass(t0).await;

    // Step 2 starts waiting four minutes later than step 0.
    h.put("rap", "2024010112", "202401011400");
    h.pass(t0 + TimeDelta::minutes(4)).await;

    let report = h.pass(t0 + TimeDelta::minutes(6)).await;
    assert_eq!(
        report.outcome(&key("2024010112", 0)),
        Some(&Outcome::Dispatched(ActionKind::Passthrough))
    );
    assert_eq!(report.outcome(&key("2024010112", 2)), Some(&Outcome::Skipped));

    let report = h.pass(t0 + TimeDelta::minutes(10)).await;
    assert_eq!(
        report.outcome(&key("2024010112", 2)),
        Some(&Outcome::Dispatched(ActionKind::Passthrough))
    );
    assert_eq!(h.invoker.count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_full_set_beats_max_wait() -> TestResult {
    let h = short_range_harness();
    h.put("rap", "2024010112", "202401011200");
    let t0 = utc("2024010112") + TimeDelta::minutes(30);
    h.pass(t0).await;

    h.put("hrrr", "2024010112", "202401011200");
    let report = h.pass(t0 + TimeDelta::minutes(20)).await;

    assert_eq!(
        report.outcome(&key("2024010112", 0)),
        Some(&Outcome::Dispatched(ActionKind::Full))
    );
    Ok(())
}

#[tokio::test]
async fn test_force_on_first_pass_dispatches_best_available() -> TestResult {
    let h = Harness::new(
        ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
            .steps(&[0, -1])
            .force_on_first_pass(&[0])
            .build(),
    );
    h.put_analysis_step0(&["rap0", "mrms"]);
    // Step -1 has a complete HRRR too, but is not forced.
    h.put("hrrr0", "2023123123", "202312312300");
    h.put("hrrr3", "2023123120", "202312312300");

    let t0 = utc("2024010100") + TimeDelta::minutes(2);
    let report = h.pass(t0).await;

    assert_eq!(
        report.outcome(&key("2024010100", 0)),
        Some(&Outcome::Dispatched(ActionKind::DegradedOneSource))
    );
    assert_eq!(report.outcome(&key("2024010100", -1)), Some(&Outcome::Skipped));
    assert_eq!(h.invoker.requests()[0].sources, vec!["HRRR"]);

    let state = h.state();
    assert!(!state.cycles[0].first_pass_pending);

    // The force only applies once.
    let report = h.pass(t0 + TimeDelta::minutes(1)).await;
    assert_eq!(report.outcome(&key("2024010100", -1)), Some(&Outcome::Skipped));
    assert_eq!(h.invoker.count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_forced_step_with_nothing_usable_is_abandoned() -> TestResult {
    let h = Harness::new(
        ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
            .force_on_first_pass(&[0])
            .build(),
    );
    // HRRR needs both hrrr0 and hrrr3; one alone completes nothing.
    h.put("hrrr0", "2024010100", "202401010000");

    let report = h.pass(utc("2024010100") + TimeDelta::minutes(2)).await;

    assert_eq!(report.outcome(&key("2024010100", 0)), Some(&Outcome::Abandoned));
    assert_eq!(h.invoker.count(), 0);
    let step = h.state().cycles[0].step(0).cloned().expect("step 0");
    assert!(step.dispatched);
    assert_eq!(step.action, None);
    Ok(())
}

#[tokio::test]
async fn test_very_late_step_without_complete_source_is_abandoned() -> TestResult {
    let h = Harness::analysis();
    h.put("hrrr0", "2024010100", "202401010000");
    let t0 = utc("2024010100") + TimeDelta::minutes(2);
    h.pass(t0).await;

    let report = h.pass(t0 + TimeDelta::minutes(21)).await;
    assert_eq!(report.outcome(&key("2024010100", 0)), Some(&Outcome::Abandoned));

    // A late file does not resurrect the step.
    h.put_analysis_step0(&[]);
    let report = h.pass(t0 + TimeDelta::minutes(25)).await;
    assert_eq!(report.outcome(&key("2024010100", 0)), Some(&Outcome::AlreadyDone));
    assert_eq!(h.invoker.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_very_late_two_complete_sources_use_two_source_variant() -> TestResult {
    let h = Harness::analysis();
    h.put_analysis_step0(&["hrrr3"]);
    let t0 = utc("2024010100") + TimeDelta::minutes(2);
    h.pass(t0).await;

    let report = h.pass(t0 + TimeDelta::minutes(21)).await;

    assert_eq!(
        report.outcome(&key("2024010100", 0)),
        Some(&Outcome::Dispatched(ActionKind::DegradedTwoSource))
    );
    let request = &h.invoker.requests()[0];
    assert_eq!(request.sources, vec!["RAP", "MRMS"]);
    assert_eq!(request.files.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_late_lead_hour_without_input_waits_for_its_files() -> TestResult {
    let h = Harness::new(
        ConfigFileBuilder::short_range(DATA_ROOT, STATE_FILE, 2)
            .very_late_minutes(60)
            .max_wait_minutes(15)
            .build(),
    );
    h.put("hrrr", "2024010112", "202401011200");
    h.put("rap", "2024010112", "202401011200");
    let t0 = utc("2024010112") + TimeDelta::minutes(30);
    h.pass(t0).await;

    let report = h.pass(t0 + TimeDelta::minutes(61)).await;
    assert_eq!(report.outcome(&key("2024010112", 2)), Some(&Outcome::Skipped));
    let step = h.state().cycles[0].step(2).cloned().expect("step 2");
    assert!(!step.dispatched);

    h.put("hrrr", "2024010112", "202401011400");
    h.put("rap", "2024010112", "202401011400");
    let report = h.pass(t0 + TimeDelta::minutes(62)).await;

    assert_eq!(
        report.outcome(&key("2024010112", 2)),
        Some(&Outcome::Dispatched(ActionKind::Full))
    );
    assert_eq!(h.invoker.count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_late_lead_hour_with_one_source_escalates_on_arrival() -> TestResult {
    let h = Harness::new(
        ConfigFileBuilder::short_range(DATA_ROOT, STATE_FILE, 1)
            .very_late_minutes(60)
            .build(),
    );
    h.put("hrrr", "2024010112", "202401011200");
    let t0 = utc("2024010112") + TimeDelta::minutes(30);
    h.pass(t0).await;

    h.put("rap", "2024010112", "202401011300");
    let report = h.pass(t0 + TimeDelta::minutes(61)).await;

    assert_eq!(
        report.outcome(&key("2024010112", 1)),
        Some(&Outcome::Dispatched(ActionKind::Passthrough))
    );
    Ok(())
}
