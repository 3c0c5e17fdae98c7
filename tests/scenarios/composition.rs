//! Test: invalid pipelines are rejected before any input is read

use crate::helpers::*;
use membatch::core::error::{BatchError, Violation};
use membatch::{BatchOptions, PipelineConfig};

#[test]
fn test_all_violations_reported_without_touching_inputs() {
    let ws = Workspace::new();
    ws.write_points("a.txt", 10);
    let yaml = format!(
        r#"
inputs:
  directory: '{}'
steps:
  - operation: filter_min_points
  - operation: smooth_surface
  - operation: export_star
    parameters:
      output_dir: '{}'
      compress: true
"#,
        ws.data_dir().display(),
        ws.out_dir().display()
    );
    let config = PipelineConfig::from_yaml(&yaml).unwrap();

    let error = match executor().plan(&config, &BatchOptions::default()) {
        Err(BatchError::Composition(error)) => error,
        Err(other) => panic!("expected composition error, got {}", other),
        Ok(_) => panic!("expected composition error"),
    };

    assert!(error.names_unknown_operation("smooth_surface"));
    assert!(error.violations.iter().any(|v| matches!(
        v,
        Violation::MissingParameter { step: 0, parameter, .. } if parameter == "min_points"
    )));
    assert!(error.violations.iter().any(|v| matches!(
        v,
        Violation::UnknownParameter { step: 2, parameter, .. } if parameter == "compress"
    )));
    assert!(error.violations.iter().any(|v| matches!(v, Violation::InvalidEntryKind { .. })));
    assert!(!ws.out_dir().exists());
}

#[test]
fn test_missing_input_directory_only_fails_after_validation() {
    let ws = Workspace::new();
    let yaml = format!(
        r#"
inputs:
  directory: '{}'
steps:
  - operation: connected_components
"#,
        ws.root().join("nowhere").display()
    );
    let config = PipelineConfig::from_yaml(&yaml).unwrap();

    let result = executor().plan(&config, &BatchOptions::default());
    assert!(matches!(result, Err(BatchError::Discovery { .. })));
}

#[test]
fn test_invalid_pattern_rejected_at_load() {
    let yaml = "inputs:\n  directory: /data\n  pattern: '(unclosed'\nsteps:\n  - operation: connected_components\n";
    let error = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(format!("{:#}", error).contains("Invalid input pattern"));
}
