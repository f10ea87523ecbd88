// tests/templates.rs

mod common;
use crate::common::{issue, utc, ConfigFileBuilder, TestResult, DATA_ROOT, STATE_FILE};

use std::path::PathBuf;
use std::time::Duration;

use forcewatch::exec::{
    render, ActionInvoker, ActionOutcome, ActionRequest, CommandTable, ProcessInvoker,
};
use forcewatch::types::ActionKind;

fn layer_request(kind: ActionKind, sources: &[&str]) -> ActionRequest {
    ActionRequest {
        kind,
        policy: "analysis_assim".to_string(),
        issue: issue("2024010100"),
        step: Some(-1),
        valid: Some(utc("2023123123")),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        files: vec![
            PathBuf::from("/data/hrrr0/2023123123/202312312300.LDASIN_DOMAIN1.nc"),
            PathBuf::from("/data/with space/x.nc"),
        ],
    }
}

fn regrid_request(source: &str) -> ActionRequest {
    ActionRequest {
        kind: ActionKind::Regrid,
        policy: "analysis_assim".to_string(),
        issue: issue("2024010100"),
        step: None,
        valid: None,
        sources: vec![source.to_string()],
        files: vec![PathBuf::from("/raw/hrrr/2024010100/f00.grib2")],
    }
}

#[test]
fn test_render_substitutes_every_placeholder() {
    let request = layer_request(ActionKind::DegradedTwoSource, &["HRRR", "RAP"]);
    let line = render(
        "layer --kind {kind} --policy {policy} {issue} {step} {valid} {sources} {files} {unknown}",
        &request,
    );

    assert_eq!(
        line,
        "layer --kind DEGRADED_TWO_SOURCE --policy analysis_assim 2024010100 -1 202312312300 \
         HRRR_RAP /data/hrrr0/2023123123/202312312300.LDASIN_DOMAIN1.nc '/data/with space/x.nc' {unknown}"
    );
}

#[test]
fn test_regrid_render_leaves_step_and_valid_empty() {
    let line = render("regrid {file} step={step} valid={valid}", &regrid_request("hrrr_raw"));
    assert_eq!(line, "regrid /raw/hrrr/2024010100/f00.grib2 step= valid=");
}

#[test]
fn test_degraded_kinds_fall_back_to_richer_templates() {
    let cfg = ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
        .action(ActionKind::Full, "full.sh")
        .action(ActionKind::DegradedOneSource, "one.sh")
        .build();
    let table = CommandTable::from_config(&cfg);

    let cmd = |kind| table.command_for(&layer_request(kind, &["HRRR"])).map(str::to_string);
    assert_eq!(cmd(ActionKind::Full).as_deref(), Some("full.sh"));
    assert_eq!(cmd(ActionKind::DegradedTwoSource).as_deref(), Some("full.sh"));
    assert_eq!(cmd(ActionKind::DegradedOneSource).as_deref(), Some("one.sh"));
    assert_eq!(cmd(ActionKind::Passthrough).as_deref(), Some("one.sh"));
    assert_eq!(cmd(ActionKind::Regrid), None);
}

#[test]
fn test_per_source_regrid_command_wins() {
    let mut raw = ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE)
        .with_regrid_source("hrrr_raw", "/raw/hrrr", 3)
        .with_regrid_source("rap_raw", "/raw/rap", 3)
        .build_raw();
    if let Some(src) = raw
        .regrid
        .as_mut()
        .and_then(|r| r.source.get_mut("rap_raw"))
    {
        src.command = Some("regrid_rap {file}".to_string());
    }
    let cfg = forcewatch::config::ConfigFile::try_from(raw).expect("valid config");
    let table = CommandTable::from_config(&cfg);

    assert_eq!(table.command_for(&regrid_request("hrrr_raw")), Some("regrid {file}"));
    assert_eq!(table.command_for(&regrid_request("rap_raw")), Some("regrid_rap {file}"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_invoker_reports_exit_codes() -> TestResult {
    let table = CommandTable::default()
        .with_command(ActionKind::Full, "exit 0")
        .with_command(ActionKind::DegradedOneSource, "exit 3");
    let mut invoker = ProcessInvoker::new(table, Duration::from_secs(10));

    let ok = invoker.invoke(layer_request(ActionKind::Full, &["HRRR"])).await?;
    assert_eq!(ok, ActionOutcome::Succeeded);

    let failed = invoker
        .invoke(layer_request(ActionKind::DegradedOneSource, &["HRRR"]))
        .await?;
    assert_eq!(failed, ActionOutcome::Failed(3));

    let missing = invoker.invoke(regrid_request("hrrr_raw")).await;
    assert!(missing.is_err(), "no regrid command configured");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_invoker_exports_request_environment() -> TestResult {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("env.txt");
    let template = format!(
        "echo \"$FORCEWATCH_KIND $FORCEWATCH_ISSUE $FORCEWATCH_STEP $FORCEWATCH_SOURCES\" > '{}'",
        out.display()
    );
    let table = CommandTable::default().with_command(ActionKind::DegradedTwoSource, template);
    let mut invoker = ProcessInvoker::new(table, Duration::from_secs(10));

    let outcome = invoker
        .invoke(layer_request(ActionKind::DegradedTwoSource, &["RAP", "MRMS"]))
        .await?;

    assert_eq!(outcome, ActionOutcome::Succeeded);
    assert_eq!(
        std::fs::read_to_string(&out)?.trim(),
        "DEGRADED_TWO_SOURCE 2024010100 -1 RAP_MRMS"
    );
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_invoker_kills_overrunning_action() -> TestResult {
    let table = CommandTable::default().with_command(ActionKind::Full, "sleep 10");
    let mut invoker = ProcessInvoker::new(table, Duration::from_millis(200));

    let outcome = invoker.invoke(layer_request(ActionKind::Full, &["HRRR"])).await?;

    assert_eq!(outcome, ActionOutcome::TimedOut);
    Ok(())
}
