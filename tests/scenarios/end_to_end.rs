//! Test: three inputs, one already processed

use crate::helpers::*;
use membatch::RunStatus;
use membatch::cli::output::format_plan;

fn setup() -> Workspace {
    let ws = Workspace::new();
    ws.write_points("fileA.txt", 600);
    ws.write_points("fileB.txt", 600);
    ws.write_points("fileC.txt", 600);
    ws.write_output("fileB.star", "data_previous\n");
    ws
}

#[test]
fn test_dry_run_lists_pending_runs() {
    let ws = setup();
    let plan = plan(&ws.star_config(500), true);

    assert_eq!(plan.pending_count(), 2);
    assert_eq!(plan.skipped_count(), 1);

    console::set_colors_enabled(false);
    let listing = format_plan(&plan);
    assert!(listing.starts_with("Total runs: 2\n"));
    assert!(listing.contains("[0] fileA"));
    assert!(listing.contains("[1] fileC"));
    assert!(!ws.output("fileA.star").exists(), "planning writes nothing");
}

#[tokio::test]
async fn test_batch_with_skip_complete() {
    let ws = setup();
    let report = run_batch(&ws.star_config(500), 2, true).await;

    assert_eq!(report.totals.total, 3);
    assert_eq!(status_of(&report, "fileA"), &RunStatus::Succeeded);
    assert_eq!(status_of(&report, "fileB"), &RunStatus::Skipped);
    assert_eq!(status_of(&report, "fileC"), &RunStatus::Succeeded);
    assert_eq!(report.exit_code(), 0);

    let written = std::fs::read_to_string(ws.output("fileA.star")).unwrap();
    assert!(written.contains("_rlnCoordinateX"));
    assert_eq!(written.lines().filter(|l| l.ends_with("\t1")).count(), 600);

    let untouched = std::fs::read_to_string(ws.output("fileB.star")).unwrap();
    assert_eq!(untouched, "data_previous\n");
}

#[tokio::test]
async fn test_without_skip_complete_everything_runs() {
    let ws = setup();
    let report = run_batch(&ws.star_config(500), 3, false).await;

    assert_eq!(report.totals.succeeded, 3);
    let rewritten = std::fs::read_to_string(ws.output("fileB.star")).unwrap();
    assert!(rewritten.contains("data_particles"));
}

#[tokio::test]
async fn test_filtered_out_run_still_succeeds_with_warning() {
    let ws = Workspace::new();
    ws.write_points("small.txt", 100);
    let report = run_batch(&ws.star_config(500), 1, false).await;

    let run = &report.runs[0];
    assert_eq!(run.status, RunStatus::Succeeded);
    assert!(run.warnings.iter().any(|w| w.contains("produced no data")));
    assert!(ws.output("small.star").exists());
}

#[tokio::test]
async fn test_report_serializes_every_run() {
    let ws = setup();
    let report = run_batch(&ws.star_config(500), 2, true).await;

    let path = ws.root().join("report.json");
    report.save(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(json["totals"]["skipped"], 1);
    let statuses: Vec<_> = json["runs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, vec!["succeeded", "skipped", "succeeded"]);
}
