//! Error taxonomy.
//!
//! Every failure is resolved per method: the generation pass records it as a
//! diagnostic and excludes that method, then moves on. Each error carries the
//! method identity and, where one exists, the full dotted path.

use crate::path::PathSyntaxError;
use crate::shape::StreamingKind;
use surfacegen_schema::model::Name;
use thiserror::Error;

/// Failure to resolve a property path against a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unknown field `{field}` on message `{message}`")]
    UnknownField { message: Name, field: Name },
    #[error("segment `{segment}` of message `{message}` is a {kind} field and cannot be descended into")]
    InvalidPathSegment {
        message: Name,
        segment: Name,
        kind: &'static str,
    },
    #[error("unknown message `{0}`")]
    UnknownMessage(Name),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeConflict {
    #[error("page streaming requires a unary method, found {0}")]
    PagedStreaming(StreamingKind),
    #[error("long-running operations require a unary method, found {0}")]
    LongRunningStreaming(StreamingKind),
    #[error("a method cannot be both paged and long-running")]
    PagedLongRunning,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{method}: shape conflict: {conflict}")]
pub struct ShapeConflictError {
    pub method: String,
    pub conflict: ShapeConflict,
}

/// Why a configured path could not be turned into a parameter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingFailure {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Syntax(#[from] PathSyntaxError),
    #[error("enum `{enum_name}` declares no values; cannot synthesize a sample")]
    MissingEnumDefault { enum_name: Name },
    #[error("overlaps with flattened path `{other}`")]
    OverlappingPaths { other: String },
    #[error("parameter name `{name}` is already bound by `{other}`")]
    DuplicateParameter { name: String, other: String },
    #[error("page streaming field `{field}`: {reason}")]
    PageStreaming { field: Name, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{method}: cannot bind `{path}`: {cause}")]
pub struct ParameterBindingError {
    pub method: String,
    pub path: String,
    pub cause: BindingFailure,
}

/// The projected call and verification descriptors disagreed when replayed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{method}: projection replay failed: {detail}")]
pub struct ProjectionError {
    pub method: String,
    pub detail: String,
}

/// Per-method umbrella error surfaced by the generation pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error(transparent)]
    Shape(#[from] ShapeConflictError),
    #[error(transparent)]
    Binding(#[from] ParameterBindingError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error("{method}: configured method not found in schema")]
    UnknownMethod { method: String },
    #[error("{method}: invalid flattened path: {cause}")]
    Config {
        method: String,
        cause: PathSyntaxError,
    },
}

impl SurfaceError {
    pub fn method(&self) -> &str {
        match self {
            SurfaceError::Shape(e) => &e.method,
            SurfaceError::Binding(e) => &e.method,
            SurfaceError::Projection(e) => &e.method,
            SurfaceError::UnknownMethod { method } => method,
            SurfaceError::Config { method, .. } => method,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            SurfaceError::Binding(e) => Some(&e.path),
            _ => None,
        }
    }

    /// Stable machine-readable kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SurfaceError::Shape(_) => "shape_conflict",
            SurfaceError::Binding(e) => match &e.cause {
                BindingFailure::Resolution(ResolutionError::UnknownField { .. }) => "unknown_field",
                BindingFailure::Resolution(ResolutionError::InvalidPathSegment { .. }) => {
                    "invalid_path_segment"
                }
                BindingFailure::Resolution(ResolutionError::UnknownMessage(_)) => "unknown_message",
                BindingFailure::Syntax(_) => "invalid_path",
                BindingFailure::MissingEnumDefault { .. } => "missing_enum_default",
                BindingFailure::OverlappingPaths { .. } => "overlapping_paths",
                BindingFailure::DuplicateParameter { .. } => "duplicate_parameter",
                BindingFailure::PageStreaming { .. } => "page_streaming",
            },
            SurfaceError::Projection(_) => "projection_mismatch",
            SurfaceError::UnknownMethod { .. } => "unknown_method",
            SurfaceError::Config { .. } => "invalid_path",
        }
    }
}
