//! Operation descriptors: parameter schema, data kinds and capability

use crate::core::{error::OperationError, geometry::Geometry};
use crate::io::Exporter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Raw parameter values as written in a pipeline configuration
pub type Parameters = BTreeMap<String, Value>;

/// Kind of data flowing between steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Accepts or produces anything
    Any,
    /// Unstructured points, as produced by import
    PointCloud,
    /// Points grouped into clusters
    Clusters,
    /// Triangulated surface
    Mesh,
    /// On-disk artifact, nothing downstream can consume it
    Artifact,
}

impl DataKind {
    /// Kind of the data handed to the first step of every run
    pub const IMPORTED: DataKind = DataKind::PointCloud;

    /// Direct widenings: data of this kind may be used where these are expected
    fn widens_to(self) -> &'static [DataKind] {
        match self {
            DataKind::Clusters => &[DataKind::PointCloud],
            DataKind::Mesh => &[DataKind::PointCloud],
            DataKind::Any | DataKind::PointCloud | DataKind::Artifact => &[],
        }
    }

    /// Whether output of this kind can feed an input declared as `input`
    ///
    /// Reflexive and transitive over `widens_to`; `Any` matches everything.
    pub fn flows_into(self, input: DataKind) -> bool {
        if self == DataKind::Any || input == DataKind::Any {
            return true;
        }

        let mut frontier = vec![self];
        let mut seen = Vec::new();
        while let Some(kind) = frontier.pop() {
            if kind == input {
                return true;
            }
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);
            frontier.extend_from_slice(kind.widens_to());
        }
        false
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataKind::Any => "any",
            DataKind::PointCloud => "point_cloud",
            DataKind::Clusters => "clusters",
            DataKind::Mesh => "mesh",
            DataKind::Artifact => "artifact",
        };
        f.write_str(name)
    }
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Float,
    Boolean,
    String,
    Path,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
            ParamType::Path => "path",
        };
        f.write_str(name)
    }
}

/// Why a bound value was rejected by its `ParamSpec`
#[derive(Debug, Clone, PartialEq)]
pub enum ParamProblem {
    TypeMismatch { found: String },
    OutOfRange { value: f64, bounds: String },
    InvalidChoice { value: String },
}

/// Schema entry for one parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            required: false,
            min: None,
            max: None,
            choices: Vec::new(),
            description: String::new(),
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Path)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check a bound value against declared type, range and choices
    pub fn check(&self, value: &Value) -> Result<(), ParamProblem> {
        let type_ok = match self.ty {
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::String | ParamType::Path => value.is_string(),
        };
        if !type_ok {
            return Err(ParamProblem::TypeMismatch {
                found: describe_value(value),
            });
        }

        if let Some(number) = value.as_f64() {
            let below = self.min.is_some_and(|min| number < min);
            let above = self.max.is_some_and(|max| number > max);
            if below || above {
                return Err(ParamProblem::OutOfRange {
                    value: number,
                    bounds: self.bounds(),
                });
            }
        }

        if let (Some(text), false) = (value.as_str(), self.choices.is_empty()) {
            if !self.choices.iter().any(|c| c == text) {
                return Err(ParamProblem::InvalidChoice {
                    value: text.to_string(),
                });
            }
        }

        Ok(())
    }

    fn bounds(&self) -> String {
        let lower = self.min.map_or("-inf".to_string(), |v| v.to_string());
        let upper = self.max.map_or("inf".to_string(), |v| v.to_string());
        format!("[{}, {}]", lower, upper)
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// Parameter values after validation, with defaults filled in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams(Parameters);

impl BoundParams {
    pub fn new(values: Parameters) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn values(&self) -> &Parameters {
        &self.0
    }

    pub fn f64(&self, name: &str) -> Result<f64, OperationError> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(name, "number"))
    }

    pub fn u64(&self, name: &str) -> Result<u64, OperationError> {
        self.get(name)
            .and_then(Value::as_u64)
            .ok_or_else(|| missing(name, "non-negative integer"))
    }

    /// Optional integer: absent and `null` both map to `None`
    pub fn opt_u64(&self, name: &str) -> Result<Option<u64>, OperationError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.u64(name).map(Some),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str, OperationError> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(name, "string"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, OperationError> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(name, "boolean"))
    }

    pub fn path(&self, name: &str) -> Result<PathBuf, OperationError> {
        self.str(name).map(PathBuf::from)
    }
}

fn missing(name: &str, expected: &str) -> OperationError {
    OperationError::InvalidParameter {
        parameter: name.to_string(),
        reason: format!("expected a {}", expected),
    }
}

/// A geometry-to-geometry processing step
pub trait GeometryOperation: Send + Sync {
    fn apply(&self, geometry: Geometry, params: &BoundParams) -> Result<Geometry, OperationError>;
}

impl<F> GeometryOperation for F
where
    F: Fn(Geometry, &BoundParams) -> Result<Geometry, OperationError> + Send + Sync,
{
    fn apply(&self, geometry: Geometry, params: &BoundParams) -> Result<Geometry, OperationError> {
        self(geometry, params)
    }
}

/// What a registered operation actually does
#[derive(Clone)]
pub enum Capability {
    /// Transform the run's geometry
    Transform(Arc<dyn GeometryOperation>),
    /// Write the run's geometry to disk; the geometry passes through unchanged
    Export(Arc<dyn Exporter>),
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Transform(_) => f.write_str("Transform"),
            Capability::Export(exporter) => write!(f, "Export(.{})", exporter.extension()),
        }
    }
}

/// Everything the registry knows about one operation
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub id: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub input: DataKind,
    pub output: DataKind,
    pub capability: Capability,
}

impl OperationDescriptor {
    /// Describe a transforming operation
    pub fn transform<O>(id: impl Into<String>, input: DataKind, output: DataKind, op: O) -> Self
    where
        O: GeometryOperation + 'static,
    {
        Self {
            id: id.into(),
            description: String::new(),
            params: Vec::new(),
            input,
            output,
            capability: Capability::Transform(Arc::new(op)),
        }
    }

    /// Describe an export; output kind equals input kind since data passes through
    pub fn export<E>(id: impl Into<String>, input: DataKind, exporter: E) -> Self
    where
        E: Exporter + 'static,
    {
        Self {
            id: id.into(),
            description: String::new(),
            params: Vec::new(),
            input,
            output: input,
            capability: Capability::Export(Arc::new(exporter)),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn param_spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn is_export(&self) -> bool {
        matches!(self.capability, Capability::Export(_))
    }
}
