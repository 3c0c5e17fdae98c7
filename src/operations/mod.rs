//! Reference operations shipped with the runner
//!
//! These are intentionally simple stand-ins for the real geometry toolkit;
//! anything implementing `GeometryOperation` or `Exporter` can be registered
//! next to them.

pub mod cluster;

use crate::core::{
    error::RegistryError,
    operation::{DataKind, OperationDescriptor, ParamSpec},
    registry::OperationRegistry,
};
use crate::io::{points::PointListExporter, star::StarExporter};

/// Register every reference operation into `registry`
pub fn register_builtins(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    registry.register(
        OperationDescriptor::transform(
            "connected_components",
            DataKind::PointCloud,
            DataKind::Clusters,
            cluster::connected_components,
        )
        .describe("Split points into clusters of mutually reachable neighbours")
        .param(
            ParamSpec::float("distance")
                .default_value(1.0)
                .min(f64::MIN_POSITIVE)
                .describe("Maximum per-axis distance between linked points"),
        ),
    )?;

    registry.register(
        OperationDescriptor::transform(
            "filter_min_points",
            DataKind::Clusters,
            DataKind::Clusters,
            cluster::filter_by_size,
        )
        .describe("Drop clusters outside a point-count window")
        .param(
            ParamSpec::integer("min_points")
                .required()
                .min(0.0)
                .describe("Smallest cluster size kept"),
        )
        .param(
            ParamSpec::integer("max_points")
                .min(0.0)
                .describe("Largest cluster size kept"),
        ),
    )?;

    registry.register(
        OperationDescriptor::export("export_star", DataKind::PointCloud, StarExporter)
            .describe("Write clusters as a STAR particle table")
            .param(ParamSpec::path("output_dir").required()),
    )?;

    registry.register(
        OperationDescriptor::export("export_points", DataKind::PointCloud, PointListExporter)
            .describe("Write clusters as a labeled point list")
            .param(ParamSpec::path("output_dir").required())
            .param(
                ParamSpec::string("delimiter")
                    .default_value("space")
                    .choices(["space", "comma", "tab"]),
            ),
    )?;

    Ok(())
}
