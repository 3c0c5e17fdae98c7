//! Core domain models
//!
//! Geometry, operation descriptors, the registry, pipeline composition and
//! the per-run state that the execution layer drives.

pub mod config;
pub mod error;
pub mod geometry;
pub mod operation;
pub mod pipeline;
pub mod registry;
pub mod run;
pub mod state;
pub mod validator;

pub use error::*;
pub use geometry::{Cluster, Geometry, Point};
pub use operation::{BoundParams, Capability, DataKind, GeometryOperation, OperationDescriptor, ParamSpec, ParamType, Parameters};
pub use pipeline::*;
pub use registry::OperationRegistry;
pub use run::PipelineRun;
pub use state::*;
