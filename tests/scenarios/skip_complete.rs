//! Test: re-running a finished batch is a no-op

use crate::helpers::*;
use membatch::RunStatus;

#[tokio::test]
async fn test_second_run_skips_everything() {
    let ws = Workspace::new();
    for name in ["m1.txt", "m2.txt", "m3.txt"] {
        ws.write_points(name, 20);
    }
    let config = ws.star_config(10);

    let first = run_batch(&config, 2, true).await;
    assert_eq!(first.totals.succeeded, 3);
    let modified = std::fs::metadata(ws.output("m2.star")).unwrap().modified().unwrap();

    let second = run_batch(&config, 2, true).await;
    assert_eq!(second.totals.skipped, 3);
    assert!(second.runs.iter().all(|r| r.status == RunStatus::Skipped));
    assert!(second.runs.iter().all(|r| r.started_at.is_none()));
    assert_eq!(second.exit_code(), 0);
    assert_eq!(
        std::fs::metadata(ws.output("m2.star")).unwrap().modified().unwrap(),
        modified
    );
}

#[tokio::test]
async fn test_empty_output_is_not_complete() {
    let ws = Workspace::new();
    ws.write_points("m1.txt", 20);
    ws.write_output("m1.star", "");

    let plan = plan(&ws.star_config(10), true);
    assert_eq!(plan.pending_count(), 1);

    let report = run_batch(&ws.star_config(10), 1, true).await;
    assert_eq!(status_of(&report, "m1"), &RunStatus::Succeeded);
    assert!(std::fs::metadata(ws.output("m1.star")).unwrap().len() > 0);
}

#[test]
fn test_skip_complete_needs_an_export() {
    let ws = Workspace::new();
    ws.write_points("m1.txt", 20);
    let yaml = format!(
        "inputs:\n  directory: '{}'\nsteps:\n  - operation: connected_components\n",
        ws.data_dir().display()
    );
    let config = membatch::PipelineConfig::from_yaml(&yaml).unwrap();

    let plan = plan(&config, true);
    assert_eq!(plan.pending_count(), 1, "no export means nothing to find on disk");
}
