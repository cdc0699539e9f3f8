use proptest::prelude::*;
use surfacegen_schema::config::ClientConfigV1;
use surfacegen_schema::descriptor_json::load_descriptor_set_json;
use surfacegen_schema::model::{ElementType, FieldKind, PrimitiveType};
use surfacegen_schema::SchemaAccessor;

const SCALAR_TAGS: [(&str, PrimitiveType); 15] = [
    ("TYPE_DOUBLE", PrimitiveType::Double),
    ("TYPE_FLOAT", PrimitiveType::Float),
    ("TYPE_INT64", PrimitiveType::Int64),
    ("TYPE_UINT64", PrimitiveType::Uint64),
    ("TYPE_INT32", PrimitiveType::Int32),
    ("TYPE_FIXED64", PrimitiveType::Fixed64),
    ("TYPE_FIXED32", PrimitiveType::Fixed32),
    ("TYPE_BOOL", PrimitiveType::Bool),
    ("TYPE_STRING", PrimitiveType::String),
    ("TYPE_BYTES", PrimitiveType::Bytes),
    ("TYPE_UINT32", PrimitiveType::Uint32),
    ("TYPE_SFIXED32", PrimitiveType::Sfixed32),
    ("TYPE_SFIXED64", PrimitiveType::Sfixed64),
    ("TYPE_SINT32", PrimitiveType::Sint32),
    ("TYPE_SINT64", PrimitiveType::Sint64),
];

fn field_strategy() -> impl Strategy<Value = ((&'static str, PrimitiveType), bool)> {
    (prop::sample::select(SCALAR_TAGS.to_vec()), any::<bool>())
}

fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn scalar_fields_keep_their_declared_kind(
        fields in prop::collection::vec(field_strategy(), 1..12),
    ) {
        let json_fields: Vec<serde_json::Value> = fields
            .iter()
            .enumerate()
            .map(|(i, ((tag, _), repeated))| {
                serde_json::json!({
                    "name": format!("f{i}"),
                    "number": i + 1,
                    "label": if *repeated { "LABEL_REPEATED" } else { "LABEL_OPTIONAL" },
                    "type": tag,
                })
            })
            .collect();
        let text = serde_json::json!({
            "file": [{"package": "p", "messageType": [{"name": "M", "field": json_fields}]}]
        })
        .to_string();

        let schema = load_descriptor_set_json(&text).expect("load");
        let message = schema.message("p.M").expect("message");
        prop_assert_eq!(message.fields.len(), fields.len());
        for (field, ((_, ty), repeated)) in message.fields.iter().zip(&fields) {
            let expected = if *repeated {
                FieldKind::Repeated { element: ElementType::Scalar { ty: *ty } }
            } else {
                FieldKind::Scalar { ty: *ty }
            };
            prop_assert_eq!(&field.kind, &expected);
        }
    }

    #[test]
    fn dotted_identifier_paths_validate(
        segments in prop::collection::vec(ident_strategy(), 1..5),
        broken in any::<bool>(),
    ) {
        let mut path = segments.join(".");
        if broken {
            path.push('.');
        }
        let text = serde_json::json!({
            "version": 1,
            "services": [{"name": "p.S", "methods": [
                {"name": "M", "flattening": {"groups": [{"parameters": [path]}]}}
            ]}]
        })
        .to_string();
        prop_assert_eq!(ClientConfigV1::from_json(&text).is_ok(), !broken);
    }
}
