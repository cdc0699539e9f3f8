//! Surfacegen schema layer
//!
//! This crate holds everything the generator *consumes*:
//!
//! - `model`: the in-memory schema tree (messages, fields, enums, services),
//!   immutable once built
//! - `accessor`: the `SchemaAccessor` trait the core traverses through
//! - `descriptor_json`: a loader for descriptor sets rendered as JSON
//!   (`buf build --as-file-descriptor-set -o descriptor.json`)
//! - `config`: the per-service client configuration file (`ClientConfigV1`)
//!
//! Parsing `.proto` sources is deliberately out of scope: we start from an
//! already-compiled descriptor set.

pub mod accessor;
pub mod config;
pub mod descriptor_json;
pub mod model;

pub use accessor::SchemaAccessor;
pub use model::{
    ElementType, EnumSchema, FieldDescriptor, FieldKind, MessageSchema, MethodDescriptor,
    PrimitiveType, SchemaSet, ServiceDescriptor,
};
