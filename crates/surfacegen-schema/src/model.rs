//! In-memory schema tree.
//!
//! A `SchemaSet` is mutable while it is being assembled (by the descriptor
//! loader or by hand in tests) and is only ever borrowed immutably by the
//! generator afterwards.
//!
//! Names are fully qualified without a leading dot (`library.v1.Book`,
//! `library.v1.Book.Author` for nested types).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub type Name = String;

// ============================================================================
// Field kinds
// ============================================================================

/// Primitive type tag carried by scalar fields (and by map keys/values and
/// repeated elements).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Uint32,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

/// Coarse grouping of primitive types that share a target-language
/// representation (and therefore a sample literal).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveFamily {
    Text,
    Bytes,
    Bool,
    Double,
    Float,
    Int32,
    Uint32,
    Int64,
    Uint64,
}

impl PrimitiveType {
    pub fn family(self) -> PrimitiveFamily {
        match self {
            PrimitiveType::String => PrimitiveFamily::Text,
            PrimitiveType::Bytes => PrimitiveFamily::Bytes,
            PrimitiveType::Bool => PrimitiveFamily::Bool,
            PrimitiveType::Double => PrimitiveFamily::Double,
            PrimitiveType::Float => PrimitiveFamily::Float,
            PrimitiveType::Int32 | PrimitiveType::Sint32 | PrimitiveType::Sfixed32 => {
                PrimitiveFamily::Int32
            }
            PrimitiveType::Uint32 | PrimitiveType::Fixed32 => PrimitiveFamily::Uint32,
            PrimitiveType::Int64 | PrimitiveType::Sint64 | PrimitiveType::Sfixed64 => {
                PrimitiveFamily::Int64
            }
            PrimitiveType::Uint64 | PrimitiveType::Fixed64 => PrimitiveFamily::Uint64,
        }
    }

    /// The `.proto` spelling of the type.
    pub fn proto_name(self) -> &'static str {
        match self {
            PrimitiveType::Double => "double",
            PrimitiveType::Float => "float",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Uint64 => "uint64",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Uint32 => "uint32",
            PrimitiveType::Sint32 => "sint32",
            PrimitiveType::Sint64 => "sint64",
            PrimitiveType::Fixed32 => "fixed32",
            PrimitiveType::Fixed64 => "fixed64",
            PrimitiveType::Sfixed32 => "sfixed32",
            PrimitiveType::Sfixed64 => "sfixed64",
            PrimitiveType::Bool => "bool",
            PrimitiveType::String => "string",
            PrimitiveType::Bytes => "bytes",
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.proto_name())
    }
}

/// The type of a single (non-repeated) value: a repeated element or a map value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ElementType {
    Scalar { ty: PrimitiveType },
    Enum { enum_name: Name },
    Message { message_name: Name },
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::Scalar { ty } => write!(f, "{ty}"),
            ElementType::Enum { enum_name } => write!(f, "{enum_name}"),
            ElementType::Message { message_name } => write!(f, "{message_name}"),
        }
    }
}

/// Semantic kind of a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum FieldKind {
    Scalar { ty: PrimitiveType },
    Enum { enum_name: Name },
    Message { message_name: Name },
    Repeated { element: ElementType },
    Map { key: PrimitiveType, value: ElementType },
}

impl FieldKind {
    /// Short kind label used in diagnostics (`scalar`, `enum`, `message`,
    /// `repeated`, `map`).
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Scalar { .. } => "scalar",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Message { .. } => "message",
            FieldKind::Repeated { .. } => "repeated",
            FieldKind::Map { .. } => "map",
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, FieldKind::Message { .. })
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self, FieldKind::Repeated { .. })
    }

    pub fn is_map(&self) -> bool {
        matches!(self, FieldKind::Map { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, FieldKind::Enum { .. })
    }

    /// Name of the message a (singular) message-kind field points at.
    pub fn message_name(&self) -> Option<&str> {
        match self {
            FieldKind::Message { message_name } => Some(message_name),
            _ => None,
        }
    }
}

impl From<ElementType> for FieldKind {
    fn from(element: ElementType) -> Self {
        match element {
            ElementType::Scalar { ty } => FieldKind::Scalar { ty },
            ElementType::Enum { enum_name } => FieldKind::Enum { enum_name },
            ElementType::Message { message_name } => FieldKind::Message { message_name },
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Scalar { ty } => write!(f, "{ty}"),
            FieldKind::Enum { enum_name } => write!(f, "{enum_name}"),
            FieldKind::Message { message_name } => write!(f, "{message_name}"),
            FieldKind::Repeated { element } => write!(f, "repeated {element}"),
            FieldKind::Map { key, value } => write!(f, "map<{key}, {value}>"),
        }
    }
}

// ============================================================================
// Schema nodes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: Name,
    /// Wire number; `0` means "assign the next free number on insertion".
    #[serde(default)]
    pub number: i32,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<Name>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number: 0,
            kind,
        }
    }

    pub fn scalar(name: impl Into<Name>, ty: PrimitiveType) -> Self {
        Self::new(name, FieldKind::Scalar { ty })
    }

    pub fn enumeration(name: impl Into<Name>, enum_name: impl Into<Name>) -> Self {
        Self::new(
            name,
            FieldKind::Enum {
                enum_name: enum_name.into(),
            },
        )
    }

    pub fn message(name: impl Into<Name>, message_name: impl Into<Name>) -> Self {
        Self::new(
            name,
            FieldKind::Message {
                message_name: message_name.into(),
            },
        )
    }

    pub fn repeated(name: impl Into<Name>, element: ElementType) -> Self {
        Self::new(name, FieldKind::Repeated { element })
    }

    pub fn map(name: impl Into<Name>, key: PrimitiveType, value: ElementType) -> Self {
        Self::new(name, FieldKind::Map { key, value })
    }

    pub fn with_number(mut self, number: i32) -> Self {
        self.number = number;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSchema {
    pub name: Name,
    pub fields: Vec<FieldDescriptor>,
}

impl MessageSchema {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field insertion. Duplicate names are rejected when the
    /// message is added to a `SchemaSet`.
    pub fn with_field(mut self, mut field: FieldDescriptor) -> Self {
        if field.number == 0 {
            field.number = self.next_field_number();
        }
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn next_field_number(&self) -> i32 {
        self.fields.iter().map(|f| f.number).max().unwrap_or(0) + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumSchema {
    pub name: Name,
    /// Value names in declaration order.
    pub values: Vec<Name>,
}

impl EnumSchema {
    pub fn new<I, S>(name: impl Into<Name>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Fully-qualified owning service.
    pub service: Name,
    pub name: Name,
    pub input_type: Name,
    pub output_type: Name,
    #[serde(default)]
    pub client_streaming: bool,
    #[serde(default)]
    pub server_streaming: bool,
}

impl MethodDescriptor {
    pub fn unary(
        service: impl Into<Name>,
        name: impl Into<Name>,
        input_type: impl Into<Name>,
        output_type: impl Into<Name>,
    ) -> Self {
        Self {
            service: service.into(),
            name: name.into(),
            input_type: input_type.into(),
            output_type: output_type.into(),
            client_streaming: false,
            server_streaming: false,
        }
    }

    pub fn with_streaming(mut self, client_streaming: bool, server_streaming: bool) -> Self {
        self.client_streaming = client_streaming;
        self.server_streaming = server_streaming;
        self
    }

    /// Canonical identity used for diagnostics and name registries:
    /// `pkg.Service/Method`.
    pub fn identity(&self) -> String {
        format!("{}/{}", self.service, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: Name,
    pub methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

// ============================================================================
// Schema set
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate message `{0}`")]
    DuplicateMessage(Name),
    #[error("duplicate field `{field}` in message `{message}`")]
    DuplicateField { message: Name, field: Name },
    #[error("duplicate enum `{0}`")]
    DuplicateEnum(Name),
    #[error("duplicate service `{0}`")]
    DuplicateService(Name),
    #[error("duplicate method `{method}` in service `{service}`")]
    DuplicateMethod { service: Name, method: Name },
}

/// All messages, enums and services known to one generation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaSet {
    pub messages: BTreeMap<Name, MessageSchema>,
    pub enums: BTreeMap<Name, EnumSchema>,
    pub services: Vec<ServiceDescriptor>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: MessageSchema) -> Result<(), SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for field in &message.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    message: message.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        if self.messages.contains_key(&message.name) {
            return Err(SchemaError::DuplicateMessage(message.name));
        }
        self.messages.insert(message.name.clone(), message);
        Ok(())
    }

    pub fn add_enum(&mut self, schema: EnumSchema) -> Result<(), SchemaError> {
        if self.enums.contains_key(&schema.name) {
            return Err(SchemaError::DuplicateEnum(schema.name));
        }
        self.enums.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn add_service(&mut self, service: ServiceDescriptor) -> Result<(), SchemaError> {
        if self.services.iter().any(|s| s.name == service.name) {
            return Err(SchemaError::DuplicateService(service.name));
        }
        let mut seen = std::collections::HashSet::new();
        for method in &service.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(SchemaError::DuplicateMethod {
                    service: service.name.clone(),
                    method: method.name.clone(),
                });
            }
        }
        self.services.push(service);
        Ok(())
    }

    pub fn with_message(mut self, message: MessageSchema) -> Result<Self, SchemaError> {
        self.add_message(message)?;
        Ok(self)
    }

    pub fn with_enum(mut self, schema: EnumSchema) -> Result<Self, SchemaError> {
        self.add_enum(schema)?;
        Ok(self)
    }

    pub fn with_service(mut self, service: ServiceDescriptor) -> Result<Self, SchemaError> {
        self.add_service(service)?;
        Ok(self)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_field_assigns_sequential_numbers() {
        let m = MessageSchema::new("pkg.M")
            .with_field(FieldDescriptor::scalar("a", PrimitiveType::String))
            .with_field(FieldDescriptor::scalar("b", PrimitiveType::Int32).with_number(7))
            .with_field(FieldDescriptor::scalar("c", PrimitiveType::Bool));
        let numbers: Vec<i32> = m.fields.iter().map(|f| f.number).collect();
        assert_eq!(numbers, vec![1, 7, 8]);
    }

    #[test]
    fn rejects_duplicate_field_names() {
        let m = MessageSchema::new("pkg.M")
            .with_field(FieldDescriptor::scalar("a", PrimitiveType::String))
            .with_field(FieldDescriptor::scalar("a", PrimitiveType::Int32));
        let err = SchemaSet::new().with_message(m).expect_err("duplicate");
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                message: "pkg.M".to_string(),
                field: "a".to_string(),
            }
        );
    }

    #[test]
    fn primitive_families_group_integer_encodings() {
        assert_eq!(PrimitiveType::Sfixed32.family(), PrimitiveFamily::Int32);
        assert_eq!(PrimitiveType::Fixed64.family(), PrimitiveFamily::Uint64);
        assert_eq!(PrimitiveType::Sint64.family(), PrimitiveFamily::Int64);
        assert_eq!(PrimitiveType::String.family(), PrimitiveFamily::Text);
    }

    #[test]
    fn field_kind_display_matches_proto_spelling() {
        let kind = FieldKind::Map {
            key: PrimitiveType::String,
            value: ElementType::Message {
                message_name: "pkg.V".to_string(),
            },
        };
        assert_eq!(kind.to_string(), "map<string, pkg.V>");
        assert_eq!(kind.label(), "map");
    }

    #[test]
    fn method_identity_is_service_slash_method() {
        let m = MethodDescriptor::unary("pkg.Library", "GetBook", "pkg.GetBookRequest", "pkg.Book");
        assert_eq!(m.identity(), "pkg.Library/GetBook");
    }
}
