//! Pipeline composition checks
//!
//! Validation never stops at the first problem. Every step is resolved,
//! every parameter checked and every kind boundary compared, so a broken
//! configuration can be fixed in one pass.

use crate::core::{
    error::{CompositionError, Violation},
    operation::{BoundParams, DataKind, OperationDescriptor, ParamProblem, ParamSpec, Parameters},
    pipeline::{Pipeline, ValidatedPipeline, ValidatedStep},
    registry::OperationRegistry,
};
use std::sync::Arc;
use tracing::debug;

/// Validate `pipeline` against `registry`
///
/// Checks run in this order: operation ids, parameters, consecutive data
/// kinds, then emptiness and the entry kind. All violations are returned
/// together.
pub fn validate(
    pipeline: &Pipeline,
    registry: &OperationRegistry,
) -> Result<ValidatedPipeline, CompositionError> {
    let mut violations = Vec::new();

    let mut resolved: Vec<Option<Arc<OperationDescriptor>>> = Vec::with_capacity(pipeline.steps.len());
    for (step, instance) in pipeline.steps.iter().enumerate() {
        match registry.lookup(&instance.operation) {
            Ok(descriptor) => resolved.push(Some(descriptor)),
            Err(_) => {
                violations.push(Violation::UnknownOperation {
                    step,
                    operation: instance.operation.clone(),
                });
                resolved.push(None);
            }
        }
    }

    let mut bound: Vec<Option<BoundParams>> = Vec::with_capacity(pipeline.steps.len());
    for (step, (instance, descriptor)) in pipeline.steps.iter().zip(&resolved).enumerate() {
        let Some(descriptor) = descriptor else {
            bound.push(None);
            continue;
        };
        let before = violations.len();
        let values = bind_parameters(step, descriptor, &instance.parameters, &mut violations);
        bound.push((violations.len() == before).then(|| BoundParams::new(values)));
    }

    for (step, pair) in resolved.windows(2).enumerate() {
        let (Some(previous), Some(next)) = (&pair[0], &pair[1]) else {
            continue;
        };
        if !previous.output.flows_into(next.input) {
            violations.push(Violation::IncompatibleKinds {
                step: step + 1,
                operation: next.id.clone(),
                expected: next.input,
                previous: step,
                previous_operation: previous.id.clone(),
                produced: previous.output,
            });
        }
    }

    match resolved.first() {
        None => violations.push(Violation::EmptyPipeline),
        Some(Some(first)) if !DataKind::IMPORTED.flows_into(first.input) => {
            violations.push(Violation::InvalidEntryKind {
                operation: first.id.clone(),
                expected: first.input,
            });
        }
        Some(_) => {}
    }

    if !violations.is_empty() {
        debug!(
            "Pipeline '{}' rejected with {} violation(s)",
            pipeline.name,
            violations.len()
        );
        return Err(CompositionError { violations });
    }

    let steps = resolved
        .into_iter()
        .zip(bound)
        .enumerate()
        .filter_map(|(index, (operation, params))| {
            Some(ValidatedStep {
                index,
                operation: operation?,
                params: params?,
            })
        })
        .collect();

    Ok(ValidatedPipeline::new(pipeline.name.clone(), steps))
}

/// Check raw values against the schema and fill in defaults
///
/// A `null` value counts as unbound.
fn bind_parameters(
    step: usize,
    descriptor: &OperationDescriptor,
    raw: &Parameters,
    violations: &mut Vec<Violation>,
) -> Parameters {
    let mut values = Parameters::new();

    for spec in &descriptor.params {
        let supplied = raw.get(&spec.name).filter(|v| !v.is_null());
        match (supplied, &spec.default) {
            (Some(value), _) => match spec.check(value) {
                Ok(()) => {
                    values.insert(spec.name.clone(), value.clone());
                }
                Err(problem) => violations.push(describe_problem(step, descriptor, spec, problem)),
            },
            (None, Some(default)) => {
                values.insert(spec.name.clone(), default.clone());
            }
            (None, None) if spec.required => violations.push(Violation::MissingParameter {
                step,
                operation: descriptor.id.clone(),
                parameter: spec.name.clone(),
            }),
            (None, None) => {}
        }
    }

    for name in raw.keys() {
        if descriptor.param_spec(name).is_none() {
            violations.push(Violation::UnknownParameter {
                step,
                operation: descriptor.id.clone(),
                parameter: name.clone(),
            });
        }
    }

    values
}

fn describe_problem(
    step: usize,
    descriptor: &OperationDescriptor,
    spec: &ParamSpec,
    problem: ParamProblem,
) -> Violation {
    let operation = descriptor.id.clone();
    let parameter = spec.name.clone();
    match problem {
        ParamProblem::TypeMismatch { found } => Violation::TypeMismatch {
            step,
            operation,
            parameter,
            expected: spec.ty,
            found,
        },
        ParamProblem::OutOfRange { value, bounds } => Violation::OutOfRange {
            step,
            operation,
            parameter,
            value,
            bounds,
        },
        ParamProblem::InvalidChoice { value } => Violation::InvalidChoice {
            step,
            operation,
            parameter,
            value,
            choices: spec.choices.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        error::OperationError,
        geometry::Geometry,
        operation::ParamType,
        pipeline::OperationInstance,
    };
    use serde_json::json;

    fn registry() -> OperationRegistry {
        OperationRegistry::builtin().unwrap()
    }

    fn step(operation: &str, params: serde_json::Value) -> OperationInstance {
        let parameters = match params {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => Parameters::new(),
        };
        OperationInstance::new(operation, parameters)
    }

    fn reference_pipeline() -> Pipeline {
        Pipeline::new("reference")
            .with_step(step("connected_components", json!({ "distance": 2.0 })))
            .with_step(step("filter_min_points", json!({ "min_points": 500 })))
            .with_step(step("export_star", json!({ "output_dir": "/tmp/out" })))
    }

    #[test]
    fn test_valid_pipeline_fills_defaults() {
        let pipeline = Pipeline::new("defaults")
            .with_step(step("connected_components", json!({})))
            .with_step(step("export_points", json!({ "output_dir": "out" })));

        let validated = validate(&pipeline, &registry()).unwrap();
        assert_eq!(validated.steps().len(), 2);
        assert_eq!(validated.steps()[0].params.f64("distance").unwrap(), 1.0);
        assert_eq!(validated.steps()[1].params.str("delimiter").unwrap(), "space");
    }

    #[test]
    fn test_reference_pipeline_is_valid() {
        let validated = validate(&reference_pipeline(), &registry()).unwrap();
        assert!(validated.has_exports());
        assert_eq!(validated.steps()[1].operation.id, "filter_min_points");
    }

    #[test]
    fn test_unknown_operation_is_named() {
        let pipeline = Pipeline::new("typo").with_step(step("conected_components", json!({})));
        let error = validate(&pipeline, &registry()).unwrap_err();
        assert!(error.names_unknown_operation("conected_components"));
        assert_eq!(error.violations.len(), 1);
    }

    #[test]
    fn test_collects_all_violations_in_order() {
        let pipeline = Pipeline::new("broken")
            .with_step(step("smooth", json!({})))
            .with_step(step("filter_min_points", json!({ "max_points": "many" })))
            .with_step(step("export_star", json!({ "output_dir": "out", "format": "v3" })));

        let error = validate(&pipeline, &registry()).unwrap_err();
        assert_eq!(
            error.violations,
            vec![
                Violation::UnknownOperation {
                    step: 0,
                    operation: "smooth".to_string(),
                },
                Violation::MissingParameter {
                    step: 1,
                    operation: "filter_min_points".to_string(),
                    parameter: "min_points".to_string(),
                },
                Violation::TypeMismatch {
                    step: 1,
                    operation: "filter_min_points".to_string(),
                    parameter: "max_points".to_string(),
                    expected: ParamType::Integer,
                    found: "string \"many\"".to_string(),
                },
                Violation::UnknownParameter {
                    step: 2,
                    operation: "export_star".to_string(),
                    parameter: "format".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_range_and_choice_violations() {
        let pipeline = Pipeline::new("ranges")
            .with_step(step("connected_components", json!({ "distance": -1.0 })))
            .with_step(step("export_points", json!({ "output_dir": "out", "delimiter": "pipe" })));

        let error = validate(&pipeline, &registry()).unwrap_err();
        assert_eq!(error.violations.len(), 2);
        assert!(matches!(error.violations[0], Violation::OutOfRange { step: 0, .. }));
        assert!(matches!(error.violations[1], Violation::InvalidChoice { step: 1, .. }));
    }

    #[test]
    fn test_null_counts_as_unbound() {
        let pipeline = Pipeline::new("nulls")
            .with_step(step("connected_components", json!({ "distance": null })))
            .with_step(step("filter_min_points", json!({ "min_points": null })));

        let error = validate(&pipeline, &registry()).unwrap_err();
        assert_eq!(
            error.violations,
            vec![Violation::MissingParameter {
                step: 1,
                operation: "filter_min_points".to_string(),
                parameter: "min_points".to_string(),
            }]
        );
    }

    #[test]
    fn test_incompatible_consecutive_kinds() {
        // export passes point_cloud through, filter wants clusters
        let pipeline = Pipeline::new("kinds")
            .with_step(step("export_star", json!({ "output_dir": "out" })))
            .with_step(step("filter_min_points", json!({ "min_points": 1 })));

        let error = validate(&pipeline, &registry()).unwrap_err();
        assert_eq!(
            error.violations,
            vec![Violation::IncompatibleKinds {
                step: 1,
                operation: "filter_min_points".to_string(),
                expected: DataKind::Clusters,
                previous: 0,
                previous_operation: "export_star".to_string(),
                produced: DataKind::PointCloud,
            }]
        );
    }

    #[test]
    fn test_widening_is_accepted() {
        // clusters widen to point_cloud for the export
        let pipeline = Pipeline::new("widen")
            .with_step(step("connected_components", json!({})))
            .with_step(step("export_star", json!({ "output_dir": "out" })));
        assert!(validate(&pipeline, &registry()).is_ok());
    }

    #[test]
    fn test_empty_pipeline() {
        let error = validate(&Pipeline::new("empty"), &registry()).unwrap_err();
        assert_eq!(error.violations, vec![Violation::EmptyPipeline]);
    }

    #[test]
    fn test_entry_kind_must_accept_imported_data() {
        fn to_mesh(geometry: Geometry, _: &BoundParams) -> Result<Geometry, OperationError> {
            Ok(geometry)
        }
        let mut registry = registry();
        registry
            .register(OperationDescriptor::transform(
                "decimate",
                DataKind::Mesh,
                DataKind::Mesh,
                to_mesh,
            ))
            .unwrap();

        let pipeline = Pipeline::new("entry").with_step(step("decimate", json!({})));
        let error = validate(&pipeline, &registry).unwrap_err();
        assert_eq!(
            error.violations,
            vec![Violation::InvalidEntryKind {
                operation: "decimate".to_string(),
                expected: DataKind::Mesh,
            }]
        );
    }

    #[test]
    fn test_unknown_step_does_not_mask_kind_checks_elsewhere() {
        let pipeline = Pipeline::new("mixed")
            .with_step(step("export_star", json!({ "output_dir": "out" })))
            .with_step(step("filter_min_points", json!({ "min_points": 1 })))
            .with_step(step("mesh_it", json!({})));

        let error = validate(&pipeline, &registry()).unwrap_err();
        assert_eq!(error.violations.len(), 2);
        assert!(error.names_unknown_operation("mesh_it"));
        assert!(matches!(error.violations[1], Violation::IncompatibleKinds { step: 1, .. }));
    }
}
