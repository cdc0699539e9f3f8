//! Replay a projected call against its verification descriptor.
//!
//! `execute` runs the request assembly with each parameter's sample value and
//! yields the request as a value tree. `verify` then evaluates every request
//! assertion and extension against that tree, and cross-checks the
//! verification descriptor against the call descriptor (doubles, result
//! handling). A generation pass runs this for every surface it emits.

use crate::binder::ParameterRole;
use crate::projector::{
    AssemblyStep, AssignedValue, CallDescriptor, DoubleSubject, ResultHandling,
    VerificationDescriptor, VerificationExtension,
};
use crate::sample::SampleValue;
use serde::Serialize;
use std::collections::BTreeMap;
use surfacegen_schema::model::Name;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("request assembly refers to unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("slot {0} is empty")]
    EmptySlot(usize),
    #[error("slot {0} is assigned twice")]
    SlotReused(usize),
    #[error("slot {0} does not hold a message")]
    NotAMessage(usize),
}

/// A request value as the assembled client would build it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ReplayValue {
    /// A value copied from a parameter.
    Bound { parameter: String, value: SampleValue },
    Message {
        message: Name,
        /// Set when the message itself was passed in as a parameter.
        from_parameter: Option<String>,
        fields: BTreeMap<Name, ReplayValue>,
    },
}

impl ReplayValue {
    fn message(message: &str, from_parameter: Option<&str>) -> Self {
        ReplayValue::Message {
            message: message.to_string(),
            from_parameter: from_parameter.map(str::to_string),
            fields: BTreeMap::new(),
        }
    }

    /// Follow field names down from this value.
    pub fn get<'p>(&self, path: impl IntoIterator<Item = &'p Name>) -> Option<&ReplayValue> {
        path.into_iter().try_fold(self, |value, segment| match value {
            ReplayValue::Message { fields, .. } => fields.get(segment),
            ReplayValue::Bound { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub subject: String,
    pub detail: String,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.subject, self.detail)
    }
}

/// Run the request assembly plan with the parameters' sample values.
pub fn execute(call: &CallDescriptor) -> Result<ReplayValue, ReplayError> {
    let mut slots: Vec<Option<ReplayValue>> = Vec::new();

    for step in &call.request.steps {
        match step {
            AssemblyStep::FromParameter {
                slot,
                message,
                parameter,
            } => {
                if call.parameter(parameter).is_none() {
                    return Err(ReplayError::UnknownParameter(parameter.clone()));
                }
                place(&mut slots, *slot, ReplayValue::message(message, Some(parameter.as_str())))?;
            }
            AssemblyStep::Build { slot, message } => {
                place(&mut slots, *slot, ReplayValue::message(message, None))?;
            }
            AssemblyStep::SetField {
                slot, field, value, ..
            } => {
                let value = match value {
                    AssignedValue::Parameter { parameter } => {
                        let p = call
                            .parameter(parameter)
                            .ok_or_else(|| ReplayError::UnknownParameter(parameter.clone()))?;
                        ReplayValue::Bound {
                            parameter: parameter.clone(),
                            value: p.sample.clone(),
                        }
                    }
                    AssignedValue::Slot { slot: source } => slots
                        .get_mut(*source)
                        .and_then(Option::take)
                        .ok_or(ReplayError::EmptySlot(*source))?,
                };
                let target = slots
                    .get_mut(*slot)
                    .and_then(Option::as_mut)
                    .ok_or(ReplayError::EmptySlot(*slot))?;
                let ReplayValue::Message { fields, .. } = target else {
                    return Err(ReplayError::NotAMessage(*slot));
                };
                fields.insert(field.clone(), value);
            }
        }
    }

    let result = call.request.result_slot;
    slots
        .get_mut(result)
        .and_then(Option::take)
        .ok_or(ReplayError::EmptySlot(result))
}

fn place(slots: &mut Vec<Option<ReplayValue>>, slot: usize, value: ReplayValue) -> Result<(), ReplayError> {
    if slots.len() <= slot {
        slots.resize_with(slot + 1, || None);
    }
    if slots[slot].is_some() {
        return Err(ReplayError::SlotReused(slot));
    }
    slots[slot] = Some(value);
    Ok(())
}

/// Replay `call` and check `verification` against it. An empty result means
/// the two descriptors agree.
pub fn verify(
    call: &CallDescriptor,
    verification: &VerificationDescriptor,
) -> Result<Vec<Mismatch>, ReplayError> {
    let request = execute(call)?;
    let mut mismatches = Vec::new();
    let mut mismatch = |subject: &str, detail: String| {
        mismatches.push(Mismatch {
            subject: subject.to_string(),
            detail,
        })
    };

    for a in &verification.request_assertions {
        match &a.field_path {
            None => match &request {
                ReplayValue::Message {
                    message,
                    from_parameter: Some(from),
                    ..
                } if *from == a.parameter => {
                    if let SampleValue::Placeholder { type_name } = &a.expected {
                        if type_name != message {
                            mismatch(
                                &a.parameter,
                                format!("request is a `{message}`, double is a `{type_name}`"),
                            );
                        }
                    }
                }
                _ => mismatch(
                    &a.parameter,
                    "request is not the parameter passed in".to_string(),
                ),
            },
            Some(path) => match request.get(path.segments()) {
                Some(ReplayValue::Bound { parameter, value })
                    if *parameter == a.parameter && *value == a.expected => {}
                Some(found) => mismatch(
                    &path.to_string(),
                    format!("expected `{}` = {:?}, found {:?}", a.parameter, a.expected, found),
                ),
                None => mismatch(&path.to_string(), "field is never set".to_string()),
            },
        }
    }

    for p in &call.parameters {
        if p.role != ParameterRole::PageSize
            && !verification
                .request_assertions
                .iter()
                .any(|a| a.parameter == p.name)
        {
            mismatch(&p.name, "parameter is never asserted".to_string());
        }
        for type_name in p.sample.placeholder_types() {
            let covered = verification.doubles.iter().any(|d| {
                d.type_name == *type_name
                    && matches!(&d.subject, DoubleSubject::Parameter { parameter } if *parameter == p.name)
            });
            if !covered {
                mismatch(&p.name, format!("no test double for `{type_name}`"));
            }
        }
    }

    for d in &verification.doubles {
        let DoubleSubject::Parameter { parameter } = &d.subject else {
            continue;
        };
        let stands_in = call
            .parameter(parameter)
            .is_some_and(|p| p.sample.placeholder_types().contains(&&d.type_name));
        if !stands_in {
            mismatch(
                &d.name,
                format!("double does not match an opaque `{}` parameter", d.type_name),
            );
        }
    }

    let mut page_size_checked = false;
    for ext in &verification.extensions {
        match ext {
            VerificationExtension::PageSize {
                field,
                parameter,
                expected,
                ..
            } => {
                page_size_checked = true;
                match request.get(std::slice::from_ref(field)) {
                    Some(ReplayValue::Bound { parameter: p, value })
                        if p == parameter && value == expected => {}
                    found => mismatch(
                        field,
                        format!("expected page size `{parameter}` = {expected:?}, found {found:?}"),
                    ),
                }
                if !matches!(
                    &call.result,
                    ResultHandling::Paged { page_size_parameter, .. } if page_size_parameter == parameter
                ) {
                    mismatch(field, "result is not paged by this parameter".to_string());
                }
            }
            VerificationExtension::PagedResources {
                resources_field,
                resource_type,
                ..
            } => {
                let agrees = matches!(
                    &call.result,
                    ResultHandling::Paged { resources_field: f, resource_type: t, .. }
                        if f == resources_field && t == resource_type
                );
                if !agrees {
                    mismatch(resources_field, "result does not page these resources".to_string());
                }
            }
            VerificationExtension::OperationResult {
                response_type,
                metadata_type,
            } => {
                let agrees = matches!(
                    &call.result,
                    ResultHandling::Operation { response_type: r, metadata_type: m }
                        if r == response_type && m == metadata_type
                );
                if !agrees {
                    mismatch(response_type, "result is not this operation".to_string());
                }
            }
            VerificationExtension::StreamedResponses { response_type } => {
                let agrees = matches!(
                    &call.result,
                    ResultHandling::Stream { response_type: r } if r == response_type
                );
                if !agrees {
                    mismatch(response_type, "result is not this stream".to_string());
                }
            }
        }
    }
    if matches!(call.result, ResultHandling::Paged { .. }) && !page_size_checked {
        mismatch(&call.method, "paged result without a page-size check".to_string());
    }

    Ok(mismatches)
}
