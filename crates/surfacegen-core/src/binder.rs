//! Parameter binding.
//!
//! Turns a classified method plus its flattened paths into:
//!
//! - an ordered parameter list, each parameter carrying a synthesized sample
//! - a request plan describing how those parameters rebuild the request
//!
//! Flattened paths sharing a prefix (`settings.timeout`, `settings.retries`)
//! land in the same nested construction, so the plan is a tree of
//! "build this sub-message from these leaves" steps rather than a flat list.

use crate::error::{BindingFailure, ParameterBindingError, ResolutionError};
use crate::naming::SurfaceNaming;
use crate::options::{FlattenedPath, FlatteningConfig, PagedResponse};
use crate::path::{resolve_steps, PathStep, PropertyPath, ProtoFieldInfo, ResolvedSteps};
use crate::sample::{canonical_literal, sample_for_kind, SampleValue};
use crate::shape::MethodShape;
use serde::Serialize;
use surfacegen_schema::model::{ElementType, FieldKind, MessageSchema, Name, PrimitiveFamily};
use surfacegen_schema::{MethodDescriptor, SchemaAccessor};

// ============================================================================
// Binding model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterRole {
    /// The whole request message.
    Request,
    /// A leaf flattened out of the request.
    Flattened,
    /// The synthetic page-size parameter of a paged method.
    PageSize,
}

#[derive(Debug, Clone)]
pub struct ParameterInfo<'a> {
    pub name: String,
    pub ty: FieldKind,
    /// The field this parameter was flattened from; `None` for the whole
    /// request and for the page size.
    pub field: Option<ProtoFieldInfo<'a>>,
    pub sample: SampleValue,
    pub role: ParameterRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageConstruction {
    pub message: Name,
    pub setters: Vec<FieldSetter>,
}

impl MessageConstruction {
    pub fn new(message: impl Into<Name>) -> Self {
        Self {
            message: message.into(),
            setters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum FieldSetter {
    /// Set `field` from the parameter at `parameter`.
    Parameter { field: Name, parameter: usize },
    /// Build a sub-message and set it as `field`.
    Message {
        field: Name,
        construction: MessageConstruction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum RequestPlan {
    /// Pass the parameter at `parameter` as the request.
    Whole { parameter: usize, message: Name },
    /// Construct the request from flattened leaves.
    Construct { construction: MessageConstruction },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingBinding {
    pub page_size_parameter: usize,
    pub page_size_field: Name,
    pub response_message: Name,
    pub token_field: Name,
    pub resources_field: Name,
    pub resource_type: ElementType,
}

#[derive(Debug, Clone)]
pub struct Binding<'a> {
    pub parameters: Vec<ParameterInfo<'a>>,
    pub request: RequestPlan,
    pub paging: Option<PagingBinding>,
}

// ============================================================================
// Binding
// ============================================================================

/// Bind the parameters of one method variant.
///
/// Without flattening the request message is the only parameter. With
/// flattening every configured path (and nested sub-path) is resolved in
/// declaration order and becomes one leaf parameter. Paged methods get a
/// trailing page-size parameter.
pub fn bind<'a, S, N>(
    schema: &'a S,
    method: &MethodDescriptor,
    shape: &MethodShape,
    flatten: Option<&FlatteningConfig>,
    paging: Option<&PagedResponse>,
    naming: &N,
) -> Result<Binding<'a>, ParameterBindingError>
where
    S: SchemaAccessor + ?Sized,
    N: SurfaceNaming + ?Sized,
{
    let root = schema.message(&method.input_type).ok_or_else(|| ParameterBindingError {
        method: method.identity(),
        path: method.input_type.clone(),
        cause: ResolutionError::UnknownMessage(method.input_type.clone()).into(),
    })?;

    let mut binder = Binder {
        schema,
        root,
        method,
        naming,
        parameters: Vec::new(),
        bound: Vec::new(),
    };

    let request = match flatten.filter(|_| shape.flattened) {
        None => {
            binder.parameters.push(ParameterInfo {
                name: naming.request_parameter_name(),
                ty: FieldKind::Message {
                    message_name: root.name.clone(),
                },
                field: None,
                sample: SampleValue::Placeholder {
                    type_name: root.name.clone(),
                },
                role: ParameterRole::Request,
            });
            RequestPlan::Whole {
                parameter: 0,
                message: root.name.clone(),
            }
        }
        Some(config) => {
            let mut construction = MessageConstruction::new(root.name.clone());
            for fp in &config.paths {
                binder.bind_flattened(None, fp, &mut construction)?;
            }
            RequestPlan::Construct { construction }
        }
    };

    let paging = if shape.paged {
        Some(binder.bind_page_size(paging)?)
    } else {
        None
    };

    tracing::debug!(
        method = %method.identity(),
        parameters = binder.parameters.len(),
        "bound parameters"
    );

    Ok(Binding {
        parameters: binder.parameters,
        request,
        paging,
    })
}

struct Binder<'a, 'm, S: ?Sized, N: ?Sized> {
    schema: &'a S,
    root: &'a MessageSchema,
    method: &'m MethodDescriptor,
    naming: &'m N,
    parameters: Vec<ParameterInfo<'a>>,
    /// Leaf paths bound so far, for overlap detection.
    bound: Vec<PropertyPath>,
}

impl<'a, 'm, S, N> Binder<'a, 'm, S, N>
where
    S: SchemaAccessor + ?Sized,
    N: SurfaceNaming + ?Sized,
{
    fn fail(&self, path: impl ToString, cause: BindingFailure) -> ParameterBindingError {
        ParameterBindingError {
            method: self.method.identity(),
            path: path.to_string(),
            cause,
        }
    }

    fn bind_flattened(
        &mut self,
        prefix: Option<&PropertyPath>,
        fp: &FlattenedPath,
        construction: &mut MessageConstruction,
    ) -> Result<(), ParameterBindingError> {
        let full = match prefix {
            Some(p) => p.join(&fp.path),
            None => fp.path.clone(),
        };
        let steps = resolve_steps(self.schema, self.root, &full)
            .map_err(|e| self.fail(&full, e.into()))?;
        let last = steps.terminal;

        if fp.nested.is_empty() {
            return self.bind_leaf(full, &steps, construction);
        }

        // Nested flattening: the terminal must itself be a message we can
        // descend into.
        let kind = self.schema.field_kind(last.field);
        let Some(message_name) = kind.message_name() else {
            return Err(self.fail(
                &full,
                ResolutionError::InvalidPathSegment {
                    message: last.owner.name.clone(),
                    segment: last.field.name.clone(),
                    kind: kind.label(),
                }
                .into(),
            ));
        };
        if self.schema.referenced_message(last.field).is_none() {
            return Err(self.fail(
                &full,
                ResolutionError::UnknownMessage(message_name.to_string()).into(),
            ));
        }
        for sub in &fp.nested {
            self.bind_flattened(Some(&full), sub, construction)?;
        }
        Ok(())
    }

    fn bind_leaf(
        &mut self,
        full: PropertyPath,
        steps: &ResolvedSteps<'a>,
        construction: &mut MessageConstruction,
    ) -> Result<(), ParameterBindingError> {
        let last = steps.terminal;

        if let Some(other) = self.bound.iter().find(|b| b.overlaps(&full)) {
            let other = other.to_string();
            return Err(self.fail(&full, BindingFailure::OverlappingPaths { other }));
        }

        let kind = self.schema.field_kind(last.field);
        let sample = sample_for_kind(self.schema, kind).map_err(|cause| self.fail(&full, cause))?;
        let name = self.naming.parameter_name(&last.field.name);
        self.ensure_unique_name(&name, &full)?;

        let index = self.parameters.len();
        self.parameters.push(ParameterInfo {
            name,
            ty: kind.clone(),
            field: Some(ProtoFieldInfo {
                path: full.clone(),
                field: last.field,
                owner: last.owner,
            }),
            sample,
            role: ParameterRole::Flattened,
        });
        insert_setter(construction, &steps.parents, last, index);
        self.bound.push(full);
        Ok(())
    }

    fn ensure_unique_name(&self, name: &str, path: &PropertyPath) -> Result<(), ParameterBindingError> {
        let Some(existing) = self.parameters.iter().find(|p| p.name == name) else {
            return Ok(());
        };
        let other = existing
            .field
            .as_ref()
            .map(|f| f.path.to_string())
            .unwrap_or_else(|| existing.name.clone());
        Err(self.fail(
            path,
            BindingFailure::DuplicateParameter {
                name: name.to_string(),
                other,
            },
        ))
    }

    fn bind_page_size(
        &mut self,
        paging: Option<&PagedResponse>,
    ) -> Result<PagingBinding, ParameterBindingError> {
        let Some(paging) = paging else {
            return Err(self.fail(
                self.method.identity(),
                BindingFailure::PageStreaming {
                    field: String::new(),
                    reason: "method is paged but has no page streaming config".to_string(),
                },
            ));
        };
        let page_streaming = |field: &str, reason: String| BindingFailure::PageStreaming {
            field: field.to_string(),
            reason,
        };

        // Page size: an integer field on the request.
        let size_field = &paging.page_size_field;
        let field = self.schema.lookup_field(self.root, size_field).ok_or_else(|| {
            self.fail(
                size_field,
                page_streaming(
                    size_field,
                    format!("not a field of request message `{}`", self.root.name),
                ),
            )
        })?;
        let size_ty = match self.schema.field_kind(field) {
            FieldKind::Scalar { ty }
                if matches!(
                    ty.family(),
                    PrimitiveFamily::Int32
                        | PrimitiveFamily::Int64
                        | PrimitiveFamily::Uint32
                        | PrimitiveFamily::Uint64
                ) =>
            {
                *ty
            }
            _ => {
                return Err(self.fail(
                    size_field,
                    page_streaming(
                        size_field,
                        format!("expected an integer field, found {}", field.kind),
                    ),
                ));
            }
        };
        let size_path = PropertyPath::new([size_field.as_str()])
            .map_err(|e| self.fail(size_field, e.into()))?;
        if let Some(other) = self.bound.iter().find(|b| b.overlaps(&size_path)) {
            let other = other.to_string();
            return Err(self.fail(size_field, BindingFailure::OverlappingPaths { other }));
        }

        // Token + resources: fields on the response.
        let response = self.schema.message(&self.method.output_type).ok_or_else(|| {
            self.fail(
                &self.method.output_type,
                ResolutionError::UnknownMessage(self.method.output_type.clone()).into(),
            )
        })?;
        let token_field = &paging.next_page_token_field;
        if self.schema.lookup_field(response, token_field).is_none() {
            return Err(self.fail(
                token_field,
                page_streaming(
                    token_field,
                    format!("not a field of response message `{}`", response.name),
                ),
            ));
        }
        let resources_field = &paging.resources_field;
        let resources = self
            .schema
            .lookup_field(response, resources_field)
            .ok_or_else(|| {
                self.fail(
                    resources_field,
                    page_streaming(
                        resources_field,
                        format!("not a field of response message `{}`", response.name),
                    ),
                )
            })?;
        let FieldKind::Repeated { element } = self.schema.field_kind(resources) else {
            return Err(self.fail(
                resources_field,
                page_streaming(
                    resources_field,
                    format!("expected a repeated field, found {}", resources.kind),
                ),
            ));
        };

        let name = self.naming.parameter_name(size_field);
        self.ensure_unique_name(&name, &size_path)?;
        let index = self.parameters.len();
        self.parameters.push(ParameterInfo {
            name,
            ty: FieldKind::Scalar { ty: size_ty },
            field: None,
            sample: canonical_literal(size_ty),
            role: ParameterRole::PageSize,
        });

        Ok(PagingBinding {
            page_size_parameter: index,
            page_size_field: size_field.clone(),
            response_message: response.name.clone(),
            token_field: token_field.clone(),
            resources_field: resources_field.clone(),
            resource_type: element.clone(),
        })
    }
}

/// Record a setter for `terminal` below `parents`, creating intermediate
/// sub-message constructions on the way.
fn insert_setter(
    node: &mut MessageConstruction,
    parents: &[PathStep<'_>],
    terminal: PathStep<'_>,
    parameter: usize,
) {
    match parents {
        [] => node.setters.push(FieldSetter::Parameter {
            field: terminal.field.name.clone(),
            parameter,
        }),
        [head, rest @ ..] => {
            for setter in node.setters.iter_mut() {
                if let FieldSetter::Message {
                    field,
                    construction,
                } = setter
                {
                    if *field == head.field.name {
                        insert_setter(construction, rest, terminal, parameter);
                        return;
                    }
                }
            }
            let owner = rest.first().map_or(terminal.owner, |step| step.owner);
            let mut construction = MessageConstruction::new(owner.name.clone());
            insert_setter(&mut construction, rest, terminal, parameter);
            node.setters.push(FieldSetter::Message {
                field: head.field.name.clone(),
                construction,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SnakeCaseNaming;
    use crate::sample::{SAMPLE_INT32, SAMPLE_INT64, SAMPLE_STRING};
    use crate::shape::classify;
    use surfacegen_schema::model::{EnumSchema, FieldDescriptor, PrimitiveType, SchemaSet};

    fn schema() -> SchemaSet {
        let mut s = SchemaSet::new();
        s.add_message(
            MessageSchema::new("pkg.UpdateRequest")
                .with_field(FieldDescriptor::scalar("name", PrimitiveType::String))
                .with_field(FieldDescriptor::message("settings", "pkg.Settings"))
                .with_field(FieldDescriptor::enumeration("mode", "pkg.Mode"))
                .with_field(FieldDescriptor::enumeration("hollow", "pkg.Hollow"))
                .with_field(FieldDescriptor::scalar("page_size", PrimitiveType::Int32)),
        )
        .expect("request");
        s.add_message(
            MessageSchema::new("pkg.Settings")
                .with_field(FieldDescriptor::scalar("timeout", PrimitiveType::Int64))
                .with_field(FieldDescriptor::scalar("name", PrimitiveType::String))
                .with_field(FieldDescriptor::message("retry", "pkg.Retry")),
        )
        .expect("settings");
        s.add_message(
            MessageSchema::new("pkg.Retry")
                .with_field(FieldDescriptor::scalar("max_attempts", PrimitiveType::Int32)),
        )
        .expect("retry");
        s.add_message(
            MessageSchema::new("pkg.UpdateResponse")
                .with_field(FieldDescriptor::scalar("next_page_token", PrimitiveType::String))
                .with_field(FieldDescriptor::repeated(
                    "items",
                    ElementType::Message {
                        message_name: "pkg.Settings".to_string(),
                    },
                )),
        )
        .expect("response");
        s.add_message(
            MessageSchema::new("pkg.ScanRequest")
                .with_field(FieldDescriptor::scalar("page_size", PrimitiveType::Int64))
                .with_field(FieldDescriptor::scalar("ratio", PrimitiveType::Double)),
        )
        .expect("scan");
        s.add_enum(EnumSchema::new("pkg.Mode", ["MODE_UNSPECIFIED", "FAST"]))
            .expect("mode");
        s.add_enum(EnumSchema::new("pkg.Hollow", Vec::<String>::new()))
            .expect("hollow");
        s
    }

    fn method() -> MethodDescriptor {
        MethodDescriptor::unary("pkg.Svc", "Update", "pkg.UpdateRequest", "pkg.UpdateResponse")
    }

    fn bind_dotted<'a>(
        s: &'a SchemaSet,
        paths: &[&str],
        paging: Option<&PagedResponse>,
    ) -> Result<Binding<'a>, ParameterBindingError> {
        let config = FlatteningConfig::from_dotted(paths.iter().copied()).expect("paths");
        let m = method();
        let shape = classify(&m, Some(&config), paging, false).expect("shape");
        bind(s, &m, &shape, Some(&config), paging, &SnakeCaseNaming)
    }

    #[test]
    fn unflattened_binds_the_whole_request() {
        let s = schema();
        let m = method();
        let shape = classify(&m, None, None, false).expect("shape");
        let binding = bind(&s, &m, &shape, None, None, &SnakeCaseNaming).expect("bind");
        assert_eq!(binding.parameters.len(), 1);
        let p = &binding.parameters[0];
        assert_eq!(p.name, "request");
        assert!(p.field.is_none());
        assert_eq!(p.role, ParameterRole::Request);
        assert!(p.sample.is_opaque());
        assert_eq!(
            binding.request,
            RequestPlan::Whole {
                parameter: 0,
                message: "pkg.UpdateRequest".to_string()
            }
        );
    }

    #[test]
    fn flattened_paths_share_nested_constructions() {
        let s = schema();
        let binding = bind_dotted(&s, &["name", "settings.timeout", "settings.retry.max_attempts"], None)
            .expect("bind");
        let names: Vec<&str> = binding.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "timeout", "max_attempts"]);
        assert_eq!(binding.parameters[0].sample, SampleValue::String(SAMPLE_STRING.to_string()));
        assert_eq!(binding.parameters[1].sample, SampleValue::Int64(SAMPLE_INT64));

        let RequestPlan::Construct { construction } = &binding.request else {
            panic!("expected construction, got {:?}", binding.request);
        };
        assert_eq!(construction.message, "pkg.UpdateRequest");
        assert_eq!(construction.setters.len(), 2);
        let FieldSetter::Message {
            field,
            construction: settings,
        } = &construction.setters[1]
        else {
            panic!("expected nested settings");
        };
        assert_eq!(field, "settings");
        assert_eq!(settings.message, "pkg.Settings");
        assert_eq!(
            settings.setters[0],
            FieldSetter::Parameter {
                field: "timeout".to_string(),
                parameter: 1
            }
        );
        assert!(matches!(
            &settings.setters[1],
            FieldSetter::Message { field, construction } if field == "retry" && construction.message == "pkg.Retry"
        ));
    }

    #[test]
    fn nested_sub_paths_resolve_relative_to_their_parent() {
        let s = schema();
        let config = FlatteningConfig::new(vec![FlattenedPath::nested(
            PropertyPath::parse("settings").expect("path"),
            vec![
                FlattenedPath::leaf(PropertyPath::parse("timeout").expect("path")),
                FlattenedPath::nested(
                    PropertyPath::parse("retry").expect("path"),
                    vec![FlattenedPath::leaf(PropertyPath::parse("max_attempts").expect("path"))],
                ),
            ],
        )]);
        let m = method();
        let shape = classify(&m, Some(&config), None, false).expect("shape");
        let binding = bind(&s, &m, &shape, Some(&config), None, &SnakeCaseNaming).expect("bind");

        let paths: Vec<String> = binding
            .parameters
            .iter()
            .filter_map(|p| p.field.as_ref().map(|f| f.path.to_string()))
            .collect();
        assert_eq!(paths, vec!["settings.timeout", "settings.retry.max_attempts"]);
        assert_eq!(binding.parameters[1].sample, SampleValue::Int32(SAMPLE_INT32));
    }

    #[test]
    fn nested_sub_paths_require_a_message_terminal() {
        let s = schema();
        let config = FlatteningConfig::new(vec![FlattenedPath::nested(
            PropertyPath::parse("name").expect("path"),
            vec![FlattenedPath::leaf(PropertyPath::parse("first").expect("path"))],
        )]);
        let m = method();
        let shape = classify(&m, Some(&config), None, false).expect("shape");
        let err = bind(&s, &m, &shape, Some(&config), None, &SnakeCaseNaming).expect_err("should fail");
        assert_eq!(err.path, "name");
        assert!(matches!(
            err.cause,
            BindingFailure::Resolution(ResolutionError::InvalidPathSegment { kind: "scalar", .. })
        ));
    }

    #[test]
    fn enum_leaf_samples_first_value_and_empty_enum_fails() {
        let s = schema();
        let binding = bind_dotted(&s, &["mode"], None).expect("bind");
        assert_eq!(
            binding.parameters[0].sample,
            SampleValue::Enum {
                enum_name: "pkg.Mode".to_string(),
                value: "MODE_UNSPECIFIED".to_string()
            }
        );

        let err = bind_dotted(&s, &["hollow"], None).expect_err("should fail");
        assert_eq!(err.path, "hollow");
        assert!(matches!(err.cause, BindingFailure::MissingEnumDefault { .. }));
    }

    #[test]
    fn overlapping_paths_are_rejected() {
        let s = schema();
        let err = bind_dotted(&s, &["settings", "settings.timeout"], None).expect_err("should fail");
        assert_eq!(err.path, "settings.timeout");
        assert_eq!(
            err.cause,
            BindingFailure::OverlappingPaths {
                other: "settings".to_string()
            }
        );
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        let s = schema();
        let err = bind_dotted(&s, &["name", "settings.name"], None).expect_err("should fail");
        assert_eq!(
            err.cause,
            BindingFailure::DuplicateParameter {
                name: "name".to_string(),
                other: "name".to_string()
            }
        );
    }

    #[test]
    fn paged_binding_appends_page_size() {
        let s = schema();
        let paging = PagedResponse {
            page_size_field: "page_size".to_string(),
            next_page_token_field: "next_page_token".to_string(),
            resources_field: "items".to_string(),
        };
        let binding = bind_dotted(&s, &["name"], Some(&paging)).expect("bind");
        assert_eq!(binding.parameters.len(), 2);
        let size = &binding.parameters[1];
        assert_eq!(size.name, "page_size");
        assert_eq!(size.role, ParameterRole::PageSize);
        assert!(size.field.is_none());
        assert_eq!(size.sample, SampleValue::Int32(SAMPLE_INT32));

        let paging = binding.paging.expect("paging");
        assert_eq!(paging.page_size_parameter, 1);
        assert_eq!(
            paging.resource_type,
            ElementType::Message {
                message_name: "pkg.Settings".to_string()
            }
        );
    }

    #[test]
    fn paged_binding_rejects_non_repeated_resources() {
        let s = schema();
        let paging = PagedResponse {
            page_size_field: "page_size".to_string(),
            next_page_token_field: "next_page_token".to_string(),
            resources_field: "next_page_token".to_string(),
        };
        let err = bind_dotted(&s, &["name"], Some(&paging)).expect_err("should fail");
        assert!(matches!(err.cause, BindingFailure::PageStreaming { ref field, .. } if field == "next_page_token"));
    }

    #[test]
    fn flattening_the_page_size_conflicts_with_paging() {
        let s = schema();
        let paging = PagedResponse {
            page_size_field: "page_size".to_string(),
            next_page_token_field: "next_page_token".to_string(),
            resources_field: "items".to_string(),
        };
        let err = bind_dotted(&s, &["page_size"], Some(&paging)).expect_err("should fail");
        assert!(matches!(err.cause, BindingFailure::OverlappingPaths { .. }));
    }

    #[test]
    fn page_size_takes_the_request_field_type() {
        let s = schema();
        let m = MethodDescriptor::unary("pkg.Svc", "Scan", "pkg.ScanRequest", "pkg.UpdateResponse");
        let paging = PagedResponse {
            page_size_field: "page_size".to_string(),
            next_page_token_field: "next_page_token".to_string(),
            resources_field: "items".to_string(),
        };
        let shape = classify(&m, None, Some(&paging), false).expect("shape");
        let binding = bind(&s, &m, &shape, None, Some(&paging), &SnakeCaseNaming).expect("bind");
        let size = &binding.parameters[1];
        assert_eq!(
            size.ty,
            FieldKind::Scalar {
                ty: PrimitiveType::Int64
            }
        );
        assert_eq!(size.sample, SampleValue::Int64(SAMPLE_INT64));

        let paging = PagedResponse {
            page_size_field: "ratio".to_string(),
            ..paging
        };
        let err = bind(&s, &m, &shape, None, Some(&paging), &SnakeCaseNaming).expect_err("should fail");
        assert!(matches!(err.cause, BindingFailure::PageStreaming { ref field, .. } if field == "ratio"));
    }
}
