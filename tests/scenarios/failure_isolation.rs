//! Test: one bad input does not affect the others

use crate::helpers::*;
use membatch::RunStatus;

#[tokio::test]
async fn test_corrupt_input_fails_alone() {
    let ws = Workspace::new();
    ws.write_points("good1.txt", 30);
    ws.write_input("bad.txt", "1.0 two 3.0\n");
    ws.write_points("good2.txt", 30);

    for workers in [1, 3] {
        let report = run_batch(&ws.star_config(10), workers, false).await;

        assert_eq!(report.totals.total, 3);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(status_of(&report, "good1"), &RunStatus::Succeeded);
        assert_eq!(status_of(&report, "good2"), &RunStatus::Succeeded);
        match status_of(&report, "bad") {
            RunStatus::Failed { cause } => {
                assert!(cause.contains("import failed"), "cause: {}", cause);
                assert!(cause.contains("line 1"), "cause: {}", cause);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!ws.output("bad.star").exists());
    }
}

#[tokio::test]
async fn test_missing_explicit_file_is_reported() {
    let ws = Workspace::new();
    let present = ws.write_points("present.txt", 30);
    let yaml = format!(
        r#"
inputs:
  files: ['{}', '{}']
steps:
  - operation: connected_components
  - operation: export_points
    parameters:
      output_dir: '{}'
      delimiter: comma
"#,
        present.display(),
        ws.data_dir().join("absent.txt").display(),
        ws.out_dir().display()
    );
    let config = membatch::PipelineConfig::from_yaml(&yaml).unwrap();
    let report = run_batch(&config, 2, false).await;

    assert_eq!(status_of(&report, "present"), &RunStatus::Succeeded);
    assert!(matches!(status_of(&report, "absent"), RunStatus::Failed { .. }));

    let written = std::fs::read_to_string(ws.output("present.txt")).unwrap();
    assert!(written.lines().any(|l| l.contains(',')));
}
