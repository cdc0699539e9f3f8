//! Descriptor-set loading (`FileDescriptorSet` JSON → `SchemaSet`).
//!
//! We consume the JSON rendering of `google.protobuf.FileDescriptorSet`, as
//! produced by:
//!
//! ```text
//! buf build --as-file-descriptor-set -o descriptor.json
//! ```
//!
//! Only the parts the generator needs are decoded: messages (including nested
//! ones), enums, and services with their streaming flags. Map fields arrive as
//! `repeated` fields pointing at a synthesized `*Entry` message carrying
//! `options.mapEntry = true`; we fold those back into `FieldKind::Map` and do
//! not expose the entry messages themselves.

use crate::model::{
    ElementType, EnumSchema, FieldDescriptor, FieldKind, MessageSchema, MethodDescriptor, Name,
    PrimitiveType, SchemaError, SchemaSet, ServiceDescriptor,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// Public API
// =============================================================================

#[derive(Debug, Error)]
pub enum DescriptorLoadError {
    #[error("failed to parse descriptor set JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{what} without a name in {context}")]
    MissingName { what: &'static str, context: String },
    #[error("field `{field}` of `{message}` has unsupported type `{ty}`")]
    UnsupportedFieldType {
        message: Name,
        field: Name,
        ty: String,
    },
    #[error("field `{field}` of `{message}` has no type name")]
    MissingTypeName { message: Name, field: Name },
    #[error("map entry `{entry}` is malformed: {reason}")]
    MalformedMapEntry { entry: Name, reason: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Load a descriptor set JSON document into a `SchemaSet`.
pub fn load_descriptor_set_json(text: &str) -> Result<SchemaSet, DescriptorLoadError> {
    let set: FileDescriptorSetJson = serde_json::from_str(text)?;

    // -------------------------------------------------------------------------
    // Pass 1: index every message (nested included) by fully-qualified name.
    // -------------------------------------------------------------------------
    let mut raw_messages: BTreeMap<Name, &DescriptorProtoJson> = BTreeMap::new();
    let mut schema = SchemaSet::new();

    for file in &set.file {
        let file_name = file.name.clone().unwrap_or_else(|| "<unknown>".to_string());
        let package = file.package.clone().unwrap_or_default();

        for m in &file.message_type {
            index_message(&package, &file_name, m, &mut raw_messages, &mut schema)?;
        }
        for e in &file.enum_type {
            schema.add_enum(convert_enum(&package, &file_name, e)?)?;
        }
    }

    // -------------------------------------------------------------------------
    // Pass 2: convert fields now that every type name can be resolved.
    // -------------------------------------------------------------------------
    for (fqn, raw) in &raw_messages {
        if is_map_entry(raw) {
            continue;
        }
        let mut message = MessageSchema::new(fqn.clone());
        for f in &raw.field {
            message.fields.push(convert_field(fqn, f, &raw_messages)?);
        }
        schema.add_message(message)?;
    }

    // -------------------------------------------------------------------------
    // Pass 3: services.
    // -------------------------------------------------------------------------
    for file in &set.file {
        let file_name = file.name.clone().unwrap_or_else(|| "<unknown>".to_string());
        let package = file.package.clone().unwrap_or_default();
        for svc in &file.service {
            let svc_name = svc.name.clone().ok_or_else(|| DescriptorLoadError::MissingName {
                what: "service",
                context: file_name.clone(),
            })?;
            let mut service = ServiceDescriptor::new(qualify_type_name(&package, &svc_name));
            for m in &svc.method {
                let name = m.name.clone().ok_or_else(|| DescriptorLoadError::MissingName {
                    what: "method",
                    context: service.name.clone(),
                })?;
                service.methods.push(MethodDescriptor {
                    service: service.name.clone(),
                    input_type: strip_leading_dot(m.input_type.as_deref().unwrap_or_default()),
                    output_type: strip_leading_dot(m.output_type.as_deref().unwrap_or_default()),
                    client_streaming: m.client_streaming.unwrap_or(false),
                    server_streaming: m.server_streaming.unwrap_or(false),
                    name,
                });
            }
            schema.add_service(service)?;
        }
    }

    Ok(schema)
}

// =============================================================================
// Descriptor JSON model (subset)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct FileDescriptorSetJson {
    #[serde(default)]
    file: Vec<FileDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileDescriptorProtoJson {
    name: Option<String>,
    package: Option<String>,
    #[serde(default, rename = "messageType")]
    message_type: Vec<DescriptorProtoJson>,
    #[serde(default, rename = "enumType")]
    enum_type: Vec<EnumDescriptorProtoJson>,
    #[serde(default)]
    service: Vec<ServiceDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct DescriptorProtoJson {
    name: Option<String>,
    #[serde(default)]
    field: Vec<FieldDescriptorProtoJson>,
    #[serde(default, rename = "nestedType")]
    nested_type: Vec<DescriptorProtoJson>,
    #[serde(default, rename = "enumType")]
    enum_type: Vec<EnumDescriptorProtoJson>,
    #[serde(default)]
    options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldDescriptorProtoJson {
    name: Option<String>,
    number: Option<i32>,
    label: Option<String>,
    #[serde(rename = "type")]
    typ: Option<String>,
    #[serde(rename = "typeName")]
    type_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnumDescriptorProtoJson {
    name: Option<String>,
    #[serde(default)]
    value: Vec<EnumValueDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct EnumValueDescriptorProtoJson {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ServiceDescriptorProtoJson {
    name: Option<String>,
    #[serde(default)]
    method: Vec<MethodDescriptorProtoJson>,
}

#[derive(Debug, Clone, Deserialize)]
struct MethodDescriptorProtoJson {
    name: Option<String>,
    #[serde(rename = "inputType")]
    input_type: Option<String>,
    #[serde(rename = "outputType")]
    output_type: Option<String>,
    #[serde(rename = "clientStreaming")]
    client_streaming: Option<bool>,
    #[serde(rename = "serverStreaming")]
    server_streaming: Option<bool>,
}

type OptionsJson = BTreeMap<String, Value>;

// =============================================================================
// Conversion helpers
// =============================================================================

fn index_message<'a>(
    prefix: &str,
    file_name: &str,
    m: &'a DescriptorProtoJson,
    raw_messages: &mut BTreeMap<Name, &'a DescriptorProtoJson>,
    schema: &mut SchemaSet,
) -> Result<(), DescriptorLoadError> {
    let name = m.name.as_deref().ok_or_else(|| DescriptorLoadError::MissingName {
        what: "message",
        context: if prefix.is_empty() {
            file_name.to_string()
        } else {
            prefix.to_string()
        },
    })?;
    let fqn = qualify_type_name(prefix, name);

    for nested in &m.nested_type {
        index_message(&fqn, file_name, nested, raw_messages, schema)?;
    }
    for e in &m.enum_type {
        schema.add_enum(convert_enum(&fqn, file_name, e)?)?;
    }

    raw_messages.insert(fqn, m);
    Ok(())
}

fn convert_enum(
    prefix: &str,
    file_name: &str,
    e: &EnumDescriptorProtoJson,
) -> Result<EnumSchema, DescriptorLoadError> {
    let name = e.name.as_deref().ok_or_else(|| DescriptorLoadError::MissingName {
        what: "enum",
        context: file_name.to_string(),
    })?;
    let fqn = qualify_type_name(prefix, name);
    let mut values = Vec::with_capacity(e.value.len());
    for v in &e.value {
        let value = v.name.clone().ok_or_else(|| DescriptorLoadError::MissingName {
            what: "enum value",
            context: fqn.clone(),
        })?;
        values.push(value);
    }
    Ok(EnumSchema { name: fqn, values })
}

fn convert_field(
    message: &str,
    f: &FieldDescriptorProtoJson,
    raw_messages: &BTreeMap<Name, &DescriptorProtoJson>,
) -> Result<FieldDescriptor, DescriptorLoadError> {
    let name = f.name.clone().ok_or_else(|| DescriptorLoadError::MissingName {
        what: "field",
        context: message.to_string(),
    })?;
    let element = element_type(message, &name, f)?;
    let repeated = f.label.as_deref() == Some("LABEL_REPEATED");

    let kind = match element {
        ElementType::Message { message_name } if repeated => {
            match raw_messages.get(&message_name) {
                Some(entry) if is_map_entry(entry) => map_kind(&message_name, entry, raw_messages)?,
                _ => FieldKind::Repeated {
                    element: ElementType::Message { message_name },
                },
            }
        }
        element if repeated => FieldKind::Repeated { element },
        element => FieldKind::from(element),
    };

    Ok(FieldDescriptor {
        name,
        number: f.number.unwrap_or(0),
        kind,
    })
}

fn map_kind(
    entry_name: &str,
    entry: &DescriptorProtoJson,
    raw_messages: &BTreeMap<Name, &DescriptorProtoJson>,
) -> Result<FieldKind, DescriptorLoadError> {
    let malformed = |reason: &str| DescriptorLoadError::MalformedMapEntry {
        entry: entry_name.to_string(),
        reason: reason.to_string(),
    };
    let key_field = entry
        .field
        .iter()
        .find(|f| f.name.as_deref() == Some("key"))
        .ok_or_else(|| malformed("missing `key` field"))?;
    let value_field = entry
        .field
        .iter()
        .find(|f| f.name.as_deref() == Some("value"))
        .ok_or_else(|| malformed("missing `value` field"))?;

    let key = match element_type(entry_name, "key", key_field)? {
        ElementType::Scalar { ty } => ty,
        _ => return Err(malformed("map keys must be scalar")),
    };
    let value = element_type(entry_name, "value", value_field)?;
    if let ElementType::Message { message_name } = &value {
        if raw_messages.get(message_name).is_some_and(|m| is_map_entry(m)) {
            return Err(malformed("map values cannot be maps"));
        }
    }
    Ok(FieldKind::Map { key, value })
}

fn element_type(
    message: &str,
    field: &str,
    f: &FieldDescriptorProtoJson,
) -> Result<ElementType, DescriptorLoadError> {
    let ty = f.typ.as_deref().unwrap_or_default();
    let named = |f: &FieldDescriptorProtoJson| {
        f.type_name
            .as_deref()
            .map(strip_leading_dot)
            .ok_or_else(|| DescriptorLoadError::MissingTypeName {
                message: message.to_string(),
                field: field.to_string(),
            })
    };

    let primitive = match ty {
        "TYPE_MESSAGE" | "TYPE_GROUP" => {
            return Ok(ElementType::Message {
                message_name: named(f)?,
            })
        }
        "TYPE_ENUM" => {
            return Ok(ElementType::Enum {
                enum_name: named(f)?,
            })
        }
        other => primitive_type(other).ok_or_else(|| DescriptorLoadError::UnsupportedFieldType {
            message: message.to_string(),
            field: field.to_string(),
            ty: other.to_string(),
        })?,
    };
    Ok(ElementType::Scalar { ty: primitive })
}

fn primitive_type(tag: &str) -> Option<PrimitiveType> {
    Some(match tag {
        "TYPE_DOUBLE" => PrimitiveType::Double,
        "TYPE_FLOAT" => PrimitiveType::Float,
        "TYPE_INT64" => PrimitiveType::Int64,
        "TYPE_UINT64" => PrimitiveType::Uint64,
        "TYPE_INT32" => PrimitiveType::Int32,
        "TYPE_FIXED64" => PrimitiveType::Fixed64,
        "TYPE_FIXED32" => PrimitiveType::Fixed32,
        "TYPE_BOOL" => PrimitiveType::Bool,
        "TYPE_STRING" => PrimitiveType::String,
        "TYPE_BYTES" => PrimitiveType::Bytes,
        "TYPE_UINT32" => PrimitiveType::Uint32,
        "TYPE_SFIXED32" => PrimitiveType::Sfixed32,
        "TYPE_SFIXED64" => PrimitiveType::Sfixed64,
        "TYPE_SINT32" => PrimitiveType::Sint32,
        "TYPE_SINT64" => PrimitiveType::Sint64,
        _ => return None,
    })
}

fn is_map_entry(m: &DescriptorProtoJson) -> bool {
    m.options
        .as_ref()
        .and_then(|o| o.get("mapEntry"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn qualify_type_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn strip_leading_dot(name: &str) -> String {
    name.strip_prefix('.').unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::SchemaAccessor;

    const LIBRARY: &str = r#"{
      "file": [{
        "name": "library/v1/library.proto",
        "package": "library.v1",
        "messageType": [
          {
            "name": "Book",
            "field": [
              {"name": "name", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING"},
              {"name": "tags", "number": 2, "label": "LABEL_REPEATED", "type": "TYPE_STRING"},
              {"name": "labels", "number": 3, "label": "LABEL_REPEATED", "type": "TYPE_MESSAGE", "typeName": ".library.v1.Book.LabelsEntry"},
              {"name": "format", "number": 4, "label": "LABEL_OPTIONAL", "type": "TYPE_ENUM", "typeName": ".library.v1.Book.Format"}
            ],
            "nestedType": [{
              "name": "LabelsEntry",
              "field": [
                {"name": "key", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING"},
                {"name": "value", "number": 2, "label": "LABEL_OPTIONAL", "type": "TYPE_INT64"}
              ],
              "options": {"mapEntry": true}
            }],
            "enumType": [{"name": "Format", "value": [{"name": "FORMAT_UNSPECIFIED", "number": 0}, {"name": "HARDCOVER", "number": 1}]}]
          },
          {
            "name": "ListBooksRequest",
            "field": [{"name": "page_size", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}]
          },
          {
            "name": "ListBooksResponse",
            "field": [{"name": "books", "number": 1, "label": "LABEL_REPEATED", "type": "TYPE_MESSAGE", "typeName": ".library.v1.Book"}]
          }
        ],
        "service": [{
          "name": "Library",
          "method": [
            {"name": "ListBooks", "inputType": ".library.v1.ListBooksRequest", "outputType": ".library.v1.ListBooksResponse"},
            {"name": "WatchBooks", "inputType": ".library.v1.ListBooksRequest", "outputType": ".library.v1.Book", "serverStreaming": true}
          ]
        }]
      }]
    }"#;

    #[test]
    fn loads_messages_enums_and_services() {
        let schema = load_descriptor_set_json(LIBRARY).expect("load");

        let book = schema.message("library.v1.Book").expect("book");
        assert_eq!(book.fields.len(), 4);
        assert_eq!(
            book.field("tags").map(|f| &f.kind),
            Some(&FieldKind::Repeated {
                element: ElementType::Scalar {
                    ty: PrimitiveType::String
                }
            })
        );
        assert_eq!(
            book.field("format").map(|f| &f.kind),
            Some(&FieldKind::Enum {
                enum_name: "library.v1.Book.Format".to_string()
            })
        );
        assert_eq!(
            schema.enum_values("library.v1.Book.Format").map(|v| v.len()),
            Some(2)
        );

        let svc = schema.service("library.v1.Library").expect("service");
        let watch = svc.method("WatchBooks").expect("method");
        assert!(watch.server_streaming);
        assert!(!watch.client_streaming);
        assert_eq!(watch.output_type, "library.v1.Book");
    }

    #[test]
    fn folds_map_entries_into_map_fields() {
        let schema = load_descriptor_set_json(LIBRARY).expect("load");
        let book = schema.message("library.v1.Book").expect("book");
        assert_eq!(
            book.field("labels").map(|f| &f.kind),
            Some(&FieldKind::Map {
                key: PrimitiveType::String,
                value: ElementType::Scalar {
                    ty: PrimitiveType::Int64
                },
            })
        );
        assert!(schema.message("library.v1.Book.LabelsEntry").is_none());
    }

    #[test]
    fn rejects_unknown_field_types() {
        let text = r#"{"file": [{"package": "p", "messageType": [
            {"name": "M", "field": [{"name": "x", "type": "TYPE_QUATERNION"}]}
        ]}]}"#;
        let err = load_descriptor_set_json(text).expect_err("should error");
        assert!(
            matches!(err, DescriptorLoadError::UnsupportedFieldType { ref ty, .. } if ty == "TYPE_QUATERNION"),
            "err={err}"
        );
    }

    #[test]
    fn reports_invalid_json() {
        let err = load_descriptor_set_json("{ not json").expect_err("should error");
        assert!(err.to_string().contains("failed to parse descriptor set JSON"));
    }
}
