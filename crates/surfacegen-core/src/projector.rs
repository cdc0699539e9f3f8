//! Dual-artifact projection.
//!
//! One binding becomes two descriptors:
//!
//! - `CallDescriptor`: which transport call the client method makes, how the
//!   request is assembled from the parameters, how the result is interpreted
//! - `VerificationDescriptor`: which test doubles a generated test needs and
//!   what it asserts about the request the client built
//!
//! Both come out of a single walk over the request plan. Every `SetField`
//! step that copies a parameter into the request emits the matching
//! assertion in the same place, so the two cannot drift apart.

use crate::binder::{Binding, FieldSetter, MessageConstruction, ParameterRole, RequestPlan};
use crate::error::ProjectionError;
use crate::naming::{NameRegistry, SurfaceNaming};
use crate::options::LongRunning;
use crate::path::PropertyPath;
use crate::sample::SampleValue;
use crate::shape::{MethodShape, StreamingKind};
use serde::Serialize;
use surfacegen_schema::model::{ElementType, FieldKind, Name};
use surfacegen_schema::MethodDescriptor;

// ============================================================================
// Call descriptor
// ============================================================================

/// The underlying stub operation a client method invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportCall {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl From<StreamingKind> for TransportCall {
    fn from(kind: StreamingKind) -> Self {
        match kind {
            StreamingKind::Unary => TransportCall::Unary,
            StreamingKind::ClientStreaming => TransportCall::ClientStreaming,
            StreamingKind::ServerStreaming => TransportCall::ServerStreaming,
            StreamingKind::BidiStreaming => TransportCall::BidiStreaming,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallParameter {
    pub name: String,
    pub ty: FieldKind,
    pub role: ParameterRole,
    pub sample: SampleValue,
    /// Full dotted path of the field this parameter was flattened from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PropertyPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum AssignedValue {
    Parameter { parameter: String },
    Slot { slot: usize },
}

/// One step of request assembly. Slots are numbered in allocation order and
/// every sub-message is fully built before the message that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum AssemblyStep {
    /// Start from a message passed in as a parameter.
    FromParameter {
        slot: usize,
        message: Name,
        parameter: String,
    },
    /// Start from an empty message.
    Build { slot: usize, message: Name },
    SetField {
        slot: usize,
        field: Name,
        accessor: String,
        value: AssignedValue,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestAssembly {
    pub steps: Vec<AssemblyStep>,
    /// Slot holding the finished request.
    pub result_slot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ResultHandling {
    /// Return the response as-is.
    Value { response_type: Name },
    /// Iterate pages, seeded by the page-size parameter.
    Paged {
        response_type: Name,
        page_size_parameter: String,
        token_field: Name,
        resources_field: Name,
        resource_type: ElementType,
    },
    /// Return a handle to a deferred operation.
    Operation {
        response_type: Name,
        metadata_type: Option<Name>,
    },
    /// Return a stream of responses.
    Stream { response_type: Name },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallDescriptor {
    /// `pkg.Service/Method`
    pub method: String,
    pub rpc: Name,
    pub client_method: String,
    pub shape: MethodShape,
    pub transport: TransportCall,
    pub parameters: Vec<CallParameter>,
    pub request: RequestAssembly,
    pub result: ResultHandling,
}

impl CallDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&CallParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

// ============================================================================
// Verification descriptor
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum DoubleSubject {
    /// Stands in for an opaque parameter.
    Parameter { parameter: String },
    /// The response the mocked transport returns.
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDouble {
    pub name: String,
    pub type_name: Name,
    pub subject: DoubleSubject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedResponse {
    pub double: String,
    pub type_name: Name,
}

/// `request.<accessors...> == <parameter>`; with no field path the request
/// itself must be the parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestAssertion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_path: Option<PropertyPath>,
    pub accessors: Vec<String>,
    pub parameter: String,
    pub expected: SampleValue,
}

/// Shape-specific checks appended to the common assertions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum VerificationExtension {
    /// The request's page-size field carries the page-size parameter.
    PageSize {
        field: Name,
        accessor: String,
        parameter: String,
        expected: SampleValue,
    },
    /// Iterating the result yields the resources of the mocked page.
    PagedResources {
        resources_field: Name,
        accessor: String,
        resource_type: ElementType,
    },
    /// Awaiting the operation yields the configured response type.
    OperationResult {
        response_type: Name,
        metadata_type: Option<Name>,
    },
    /// The response stream yields the mocked responses in order.
    StreamedResponses { response_type: Name },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationDescriptor {
    pub test_name: String,
    pub doubles: Vec<TestDouble>,
    pub expected_response: ExpectedResponse,
    pub request_assertions: Vec<RequestAssertion>,
    pub extensions: Vec<VerificationExtension>,
}

// ============================================================================
// Projection
// ============================================================================

/// Project one bound method variant into its call and verification
/// descriptors. Names are claimed from `registry`, so successive variants of
/// the same method get distinct client method and test names.
pub fn project<N>(
    method: &MethodDescriptor,
    shape: &MethodShape,
    binding: &Binding<'_>,
    long_running: Option<&LongRunning>,
    naming: &N,
    registry: &mut NameRegistry,
) -> Result<(CallDescriptor, VerificationDescriptor), ProjectionError>
where
    N: SurfaceNaming + ?Sized,
{
    let fail = |detail: String| ProjectionError {
        method: method.identity(),
        detail,
    };

    let parameters: Vec<CallParameter> = binding
        .parameters
        .iter()
        .map(|p| CallParameter {
            name: p.name.clone(),
            ty: p.ty.clone(),
            role: p.role,
            sample: p.sample.clone(),
            source_path: p.field.as_ref().map(|f| f.path.clone()),
        })
        .collect();
    let parameter_at = |index: usize| {
        parameters
            .get(index)
            .ok_or_else(|| fail(format!("request plan refers to missing parameter #{index}")))
    };

    // Request assembly and request assertions, in one walk.
    let mut walk = Walk {
        naming,
        steps: Vec::new(),
        assertions: Vec::new(),
        next_slot: 0,
    };
    let result_slot = match &binding.request {
        RequestPlan::Whole { parameter, message } => {
            let p = parameter_at(*parameter)?;
            let slot = walk.alloc();
            walk.steps.push(AssemblyStep::FromParameter {
                slot,
                message: message.clone(),
                parameter: p.name.clone(),
            });
            walk.assertions.push(RequestAssertion {
                field_path: None,
                accessors: Vec::new(),
                parameter: p.name.clone(),
                expected: p.sample.clone(),
            });
            slot
        }
        RequestPlan::Construct { construction } => {
            walk.construct(construction, &[], &parameter_at)?
        }
    };

    let mut extensions = Vec::new();
    if let Some(paging) = &binding.paging {
        let p = parameter_at(paging.page_size_parameter)?;
        let accessor = naming.accessor_name(&paging.page_size_field);
        walk.steps.push(AssemblyStep::SetField {
            slot: result_slot,
            field: paging.page_size_field.clone(),
            accessor: accessor.clone(),
            value: AssignedValue::Parameter {
                parameter: p.name.clone(),
            },
        });
        extensions.push(VerificationExtension::PageSize {
            field: paging.page_size_field.clone(),
            accessor,
            parameter: p.name.clone(),
            expected: p.sample.clone(),
        });
    }

    let result = if shape.paged {
        let Some(paging) = &binding.paging else {
            return Err(fail("paged shape without a paging binding".to_string()));
        };
        let page_size_parameter = parameter_at(paging.page_size_parameter)?.name.clone();
        extensions.push(VerificationExtension::PagedResources {
            resources_field: paging.resources_field.clone(),
            accessor: naming.accessor_name(&paging.resources_field),
            resource_type: paging.resource_type.clone(),
        });
        ResultHandling::Paged {
            response_type: paging.response_message.clone(),
            page_size_parameter,
            token_field: paging.token_field.clone(),
            resources_field: paging.resources_field.clone(),
            resource_type: paging.resource_type.clone(),
        }
    } else if shape.long_running {
        let Some(lro) = long_running else {
            return Err(fail("long-running shape without operation types".to_string()));
        };
        extensions.push(VerificationExtension::OperationResult {
            response_type: lro.response_type.clone(),
            metadata_type: lro.metadata_type.clone(),
        });
        ResultHandling::Operation {
            response_type: lro.response_type.clone(),
            metadata_type: lro.metadata_type.clone(),
        }
    } else if shape.streaming.streams_responses() {
        extensions.push(VerificationExtension::StreamedResponses {
            response_type: method.output_type.clone(),
        });
        ResultHandling::Stream {
            response_type: method.output_type.clone(),
        }
    } else {
        ResultHandling::Value {
            response_type: method.output_type.clone(),
        }
    };

    let client_method = registry.claim(method, &naming.method_name(&method.name));
    let test_name = registry.claim(method, &naming.test_name(&client_method));

    // One double per message type a sample needs, including the elements of
    // repeated and map samples.
    let mut doubles: Vec<TestDouble> = parameters
        .iter()
        .flat_map(|p| {
            p.sample
                .placeholder_types()
                .into_iter()
                .enumerate()
                .map(|(i, type_name)| {
                    let subject = if i == 0 {
                        p.name.clone()
                    } else {
                        format!("{}_{}", p.name, i + 1)
                    };
                    TestDouble {
                        name: naming.double_name(&subject),
                        type_name: type_name.clone(),
                        subject: DoubleSubject::Parameter {
                            parameter: p.name.clone(),
                        },
                    }
                })
        })
        .collect();
    // The transport always answers with the wire response, even when the
    // client method unwraps it into pages or an operation handle.
    let response = TestDouble {
        name: naming.double_name("response"),
        type_name: method.output_type.clone(),
        subject: DoubleSubject::Response,
    };
    let expected_response = ExpectedResponse {
        double: response.name.clone(),
        type_name: response.type_name.clone(),
    };
    doubles.push(response);

    tracing::debug!(
        method = %method.identity(),
        client_method = %client_method,
        steps = walk.steps.len(),
        assertions = walk.assertions.len(),
        "projected method"
    );

    let call = CallDescriptor {
        method: method.identity(),
        rpc: method.name.clone(),
        client_method,
        shape: *shape,
        transport: shape.streaming.into(),
        parameters,
        request: RequestAssembly {
            steps: walk.steps,
            result_slot,
        },
        result,
    };
    let verification = VerificationDescriptor {
        test_name,
        doubles,
        expected_response,
        request_assertions: walk.assertions,
        extensions,
    };
    Ok((call, verification))
}

struct Walk<'n, N: ?Sized> {
    naming: &'n N,
    steps: Vec<AssemblyStep>,
    assertions: Vec<RequestAssertion>,
    next_slot: usize,
}

impl<'n, N: SurfaceNaming + ?Sized> Walk<'n, N> {
    fn alloc(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    /// Emit the steps building `construction` (children first) and return its
    /// slot. `prefix` is the field path from the request root down to it.
    fn construct<'p, F>(
        &mut self,
        construction: &MessageConstruction,
        prefix: &[Name],
        parameter_at: &F,
    ) -> Result<usize, ProjectionError>
    where
        F: Fn(usize) -> Result<&'p CallParameter, ProjectionError>,
    {
        let mut child_slots = Vec::with_capacity(construction.setters.len());
        for setter in &construction.setters {
            let slot = match setter {
                FieldSetter::Message {
                    field,
                    construction: child,
                } => {
                    let mut child_prefix = prefix.to_vec();
                    child_prefix.push(field.clone());
                    Some(self.construct(child, &child_prefix, parameter_at)?)
                }
                FieldSetter::Parameter { .. } => None,
            };
            child_slots.push(slot);
        }

        let slot = self.alloc();
        self.steps.push(AssemblyStep::Build {
            slot,
            message: construction.message.clone(),
        });
        for (setter, child_slot) in construction.setters.iter().zip(child_slots) {
            match (setter, child_slot) {
                (FieldSetter::Parameter { field, parameter }, _) => {
                    let p = parameter_at(*parameter)?;
                    let accessor = self.naming.accessor_name(field);
                    self.steps.push(AssemblyStep::SetField {
                        slot,
                        field: field.clone(),
                        accessor,
                        value: AssignedValue::Parameter {
                            parameter: p.name.clone(),
                        },
                    });

                    let mut segments = prefix.to_vec();
                    segments.push(field.clone());
                    let accessors = segments
                        .iter()
                        .map(|s| self.naming.accessor_name(s))
                        .collect();
                    self.assertions.push(RequestAssertion {
                        field_path: p.source_path.clone(),
                        accessors,
                        parameter: p.name.clone(),
                        expected: p.sample.clone(),
                    });
                }
                (FieldSetter::Message { field, .. }, Some(child)) => {
                    self.steps.push(AssemblyStep::SetField {
                        slot,
                        field: field.clone(),
                        accessor: self.naming.accessor_name(field),
                        value: AssignedValue::Slot { slot: child },
                    });
                }
                (FieldSetter::Message { .. }, None) => {}
            }
        }
        Ok(slot)
    }
}
