//! Surfacegen core
//!
//! Derives a client calling convention for each RPC and projects it into two
//! parallel, abstract artifacts: a call descriptor (what the client method
//! does) and a verification descriptor (what its generated test asserts).
//!
//! Pipeline, leaf-first:
//!
//! - `path`: property-path traversal against the schema tree
//! - `shape`: method shape classification (streaming × flattened × paged × LRO)
//! - `sample` + `binder`: ordered parameters with canonical sample values and
//!   a request construction plan
//! - `projector`: call + verification descriptors from one shared walk
//! - `replay`: executes a call descriptor and checks its verification
//!   descriptor against the result
//! - `generate`: the batch pass with per-method diagnostics
//!
//! Every stage is a pure function of borrowed schema data. Nothing here
//! renders target-language text or touches the filesystem.

pub mod binder;
pub mod error;
pub mod generate;
pub mod naming;
pub mod options;
pub mod path;
pub mod projector;
pub mod replay;
pub mod sample;
pub mod shape;

pub use binder::{bind, Binding, ParameterInfo, ParameterRole, RequestPlan};
pub use error::{
    BindingFailure, ParameterBindingError, ProjectionError, ResolutionError, ShapeConflict,
    ShapeConflictError, SurfaceError,
};
pub use generate::{Diagnostic, GenerationReport, Generator, MethodSurface, SurfaceVariant};
pub use naming::{NameRegistry, SnakeCaseNaming, SurfaceNaming};
pub use options::{FlattenedPath, FlatteningConfig, LongRunning, MethodOptions, PagedResponse};
pub use path::{resolve, PropertyPath, ProtoFieldInfo};
pub use projector::{project, CallDescriptor, VerificationDescriptor};
pub use shape::{classify, MethodShape, StreamingKind};
