//! Sample value synthesis.
//!
//! Each primitive family maps to exactly one canonical literal. Generated call
//! sites, documentation snippets and generated tests all draw from this table,
//! so the same field always samples to the same value.

use crate::error::BindingFailure;
use serde::Serialize;
use surfacegen_schema::model::{ElementType, FieldKind, Name, PrimitiveFamily, PrimitiveType};
use surfacegen_schema::SchemaAccessor;

pub const SAMPLE_STRING: &str = "sample";
pub const SAMPLE_BYTES: &[u8] = b"sample";
pub const SAMPLE_BOOL: bool = true;
pub const SAMPLE_DOUBLE: f64 = 3.5;
pub const SAMPLE_FLOAT: f32 = 1.5;
pub const SAMPLE_INT32: i32 = 42;
pub const SAMPLE_UINT32: u32 = 42;
pub const SAMPLE_INT64: i64 = 1_234_567_890;
pub const SAMPLE_UINT64: u64 = 1_234_567_890;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", content = "value", rename_all = "snake_case")]
pub enum SampleValue {
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Double(f64),
    Float(f32),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Enum { enum_name: Name, value: Name },
    List(Vec<SampleValue>),
    Map(Vec<(SampleValue, SampleValue)>),
    /// Not a literal: a test double of the named type goes here.
    Placeholder { type_name: Name },
}

impl SampleValue {
    /// True when the value must be supplied by a test double rather than
    /// written out as a literal.
    pub fn is_opaque(&self) -> bool {
        matches!(self, SampleValue::Placeholder { .. })
    }

    /// Types of every placeholder in this value, collection contents
    /// included, without repeats.
    pub fn placeholder_types(&self) -> Vec<&Name> {
        let mut found = Vec::new();
        self.collect_placeholders(&mut found);
        found
    }

    fn collect_placeholders<'a>(&'a self, found: &mut Vec<&'a Name>) {
        match self {
            SampleValue::Placeholder { type_name } => {
                if !found.contains(&type_name) {
                    found.push(type_name);
                }
            }
            SampleValue::List(items) => {
                for item in items {
                    item.collect_placeholders(found);
                }
            }
            SampleValue::Map(entries) => {
                for (key, value) in entries {
                    key.collect_placeholders(found);
                    value.collect_placeholders(found);
                }
            }
            _ => {}
        }
    }
}

/// The canonical literal for a primitive type.
pub fn canonical_literal(ty: PrimitiveType) -> SampleValue {
    match ty.family() {
        PrimitiveFamily::Text => SampleValue::String(SAMPLE_STRING.to_string()),
        PrimitiveFamily::Bytes => SampleValue::Bytes(SAMPLE_BYTES.to_vec()),
        PrimitiveFamily::Bool => SampleValue::Bool(SAMPLE_BOOL),
        PrimitiveFamily::Double => SampleValue::Double(SAMPLE_DOUBLE),
        PrimitiveFamily::Float => SampleValue::Float(SAMPLE_FLOAT),
        PrimitiveFamily::Int32 => SampleValue::Int32(SAMPLE_INT32),
        PrimitiveFamily::Uint32 => SampleValue::Uint32(SAMPLE_UINT32),
        PrimitiveFamily::Int64 => SampleValue::Int64(SAMPLE_INT64),
        PrimitiveFamily::Uint64 => SampleValue::Uint64(SAMPLE_UINT64),
    }
}

/// Sample for a field of the given kind.
///
/// - enum: first declared value (`MissingEnumDefault` if there is none)
/// - scalar: the canonical literal
/// - repeated: a one-element list
/// - map: a one-entry map
/// - message, or an enum unknown to the schema: a placeholder
pub fn sample_for_kind<S>(schema: &S, kind: &FieldKind) -> Result<SampleValue, BindingFailure>
where
    S: SchemaAccessor + ?Sized,
{
    match kind {
        FieldKind::Scalar { ty } => Ok(canonical_literal(*ty)),
        FieldKind::Enum { enum_name } => sample_for_enum(schema, enum_name),
        FieldKind::Message { message_name } => Ok(SampleValue::Placeholder {
            type_name: message_name.clone(),
        }),
        FieldKind::Repeated { element } => {
            Ok(SampleValue::List(vec![sample_for_element(schema, element)?]))
        }
        FieldKind::Map { key, value } => Ok(SampleValue::Map(vec![(
            canonical_literal(*key),
            sample_for_element(schema, value)?,
        )])),
    }
}

pub fn sample_for_element<S>(schema: &S, element: &ElementType) -> Result<SampleValue, BindingFailure>
where
    S: SchemaAccessor + ?Sized,
{
    match element {
        ElementType::Scalar { ty } => Ok(canonical_literal(*ty)),
        ElementType::Enum { enum_name } => sample_for_enum(schema, enum_name),
        ElementType::Message { message_name } => Ok(SampleValue::Placeholder {
            type_name: message_name.clone(),
        }),
    }
}

fn sample_for_enum<S>(schema: &S, enum_name: &str) -> Result<SampleValue, BindingFailure>
where
    S: SchemaAccessor + ?Sized,
{
    match schema.enum_values(enum_name) {
        None => Ok(SampleValue::Placeholder {
            type_name: enum_name.to_string(),
        }),
        Some([]) => Err(BindingFailure::MissingEnumDefault {
            enum_name: enum_name.to_string(),
        }),
        Some([first, ..]) => Ok(SampleValue::Enum {
            enum_name: enum_name.to_string(),
            value: first.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surfacegen_schema::model::{EnumSchema, SchemaSet};

    fn schema() -> SchemaSet {
        let mut s = SchemaSet::new();
        s.add_enum(EnumSchema::new("pkg.Color", ["COLOR_UNSPECIFIED", "RED"]))
            .expect("color");
        s.add_enum(EnumSchema::new("pkg.Hollow", Vec::<String>::new()))
            .expect("hollow");
        s
    }

    #[test]
    fn integer_encodings_share_a_literal() {
        assert_eq!(
            canonical_literal(PrimitiveType::Int64),
            canonical_literal(PrimitiveType::Sfixed64)
        );
        assert_eq!(canonical_literal(PrimitiveType::Sint32), SampleValue::Int32(SAMPLE_INT32));
    }

    #[test]
    fn enum_samples_to_first_declared_value() {
        let s = schema();
        let v = sample_for_kind(
            &s,
            &FieldKind::Enum {
                enum_name: "pkg.Color".to_string(),
            },
        )
        .expect("sample");
        assert_eq!(
            v,
            SampleValue::Enum {
                enum_name: "pkg.Color".to_string(),
                value: "COLOR_UNSPECIFIED".to_string(),
            }
        );
    }

    #[test]
    fn empty_enum_has_no_default() {
        let s = schema();
        let err = sample_for_kind(
            &s,
            &FieldKind::Enum {
                enum_name: "pkg.Hollow".to_string(),
            },
        )
        .expect_err("should error");
        assert_eq!(
            err,
            BindingFailure::MissingEnumDefault {
                enum_name: "pkg.Hollow".to_string()
            }
        );
    }

    #[test]
    fn unknown_enum_becomes_placeholder() {
        let s = schema();
        let v = sample_for_kind(
            &s,
            &FieldKind::Enum {
                enum_name: "pkg.Elsewhere".to_string(),
            },
        )
        .expect("sample");
        assert!(v.is_opaque());
    }

    #[test]
    fn collections_wrap_one_element() {
        let s = schema();
        let list = sample_for_kind(
            &s,
            &FieldKind::Repeated {
                element: ElementType::Scalar {
                    ty: PrimitiveType::String,
                },
            },
        )
        .expect("list");
        assert_eq!(list, SampleValue::List(vec![SampleValue::String(SAMPLE_STRING.to_string())]));

        let map = sample_for_kind(
            &s,
            &FieldKind::Map {
                key: PrimitiveType::Int32,
                value: ElementType::Message {
                    message_name: "pkg.V".to_string(),
                },
            },
        )
        .expect("map");
        assert_eq!(
            map,
            SampleValue::Map(vec![(
                SampleValue::Int32(SAMPLE_INT32),
                SampleValue::Placeholder {
                    type_name: "pkg.V".to_string()
                }
            )])
        );
    }

    #[test]
    fn placeholders_are_found_inside_collections() {
        let scalar = SampleValue::List(vec![SampleValue::String(SAMPLE_STRING.to_string())]);
        assert!(scalar.placeholder_types().is_empty());

        let map = SampleValue::Map(vec![(
            SampleValue::Int32(SAMPLE_INT32),
            SampleValue::Placeholder {
                type_name: "pkg.V".to_string(),
            },
        )]);
        assert!(!map.is_opaque());
        assert_eq!(map.placeholder_types(), vec!["pkg.V"]);

        let twice = SampleValue::List(vec![
            SampleValue::Placeholder {
                type_name: "pkg.V".to_string(),
            },
            map,
        ]);
        assert_eq!(twice.placeholder_types(), vec!["pkg.V"]);
    }
}
