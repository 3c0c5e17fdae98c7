//! Test: `--index` addresses the same list `--dry-run` prints

use crate::helpers::*;
use membatch::core::error::BatchError;
use membatch::{RunStatus, TaskManager};

#[tokio::test]
async fn test_index_matches_dry_run_listing() {
    let ws = Workspace::new();
    for name in ["t10.txt", "t2.txt", "t1.txt"] {
        ws.write_points(name, 20);
    }
    ws.write_output("t2.star", "data_done\n");
    let config = ws.star_config(10);

    let listed: Vec<String> = plan(&config, true)
        .pending()
        .iter()
        .map(|r| r.run_id.clone())
        .collect();
    assert_eq!(listed, vec!["t1", "t10"], "natural order, complete runs excluded");

    let executor = executor();
    let mut manager = TaskManager::new(1).unwrap();
    let report = executor
        .run_index(plan(&config, true), 1, &mut manager)
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 1);
    assert_eq!(report.runs[0].run_id, "t10");
    assert_eq!(report.runs[0].status, RunStatus::Succeeded);
    assert!(ws.output("t10.star").exists());
    assert!(!ws.output("t1.star").exists());

    let result = executor.run_index(plan(&config, true), 1, &mut manager).await;
    assert!(
        matches!(result, Err(BatchError::IndexOutOfRange { index: 1, total: 1 })),
        "t10 is now complete, so only t1 remains"
    );
    manager.shutdown().await;
}

/// Every index of the dry-run list, run one at a time, matches one parallel batch
#[tokio::test]
async fn test_index_sweep_matches_parallel_run() {
    let ws = Workspace::new();
    for name in ["s1.txt", "s2.txt", "s3.txt", "s4.txt"] {
        ws.write_points(name, 20);
    }
    ws.write_input("s5.txt", "0.0 0.0\n");
    let config = ws.star_config(10);

    let executor = executor();
    let total = plan(&config, false).pending_count();
    assert_eq!(total, 5);

    let mut swept = Vec::new();
    let mut manager = TaskManager::new(1).unwrap();
    for index in 0..total {
        let report = executor
            .run_index(plan(&config, false), index, &mut manager)
            .await
            .unwrap();
        assert_eq!(report.runs.len(), 1);
        swept.push(report.runs[0].status.label().to_string());
    }
    manager.shutdown().await;

    let parallel = run_batch(&config, 3, false).await;
    let mut together: Vec<String> = parallel
        .runs
        .iter()
        .map(|r| r.status.label().to_string())
        .collect();

    swept.sort();
    together.sort();
    assert_eq!(swept, together);
    assert_eq!(swept.iter().filter(|s| *s == "failed").count(), 1);
    assert_eq!(swept.iter().filter(|s| *s == "succeeded").count(), 4);
}
