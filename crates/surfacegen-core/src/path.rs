//! Property paths and their resolution against a message tree.
//!
//! A path is data, not a graph walk: resolution visits exactly one field per
//! segment, so schema-level cycles (`Node.parent: Node`) can never cause
//! non-termination.

use crate::error::ResolutionError;
use serde::{Serialize, Serializer};
use surfacegen_schema::model::{FieldDescriptor, FieldKind, MessageSchema, Name};
use surfacegen_schema::SchemaAccessor;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathSyntaxError {
    #[error("property path is empty")]
    Empty,
    #[error("property path `{0}` has an empty segment")]
    EmptySegment(String),
}

/// Ordered, non-empty sequence of field names rooted at a method's input
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyPath {
    /// Segments descended through, root first.
    parents: Vec<Name>,
    terminal: Name,
}

impl PropertyPath {
    pub fn new<I, S>(segments: I) -> Result<Self, PathSyntaxError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        let mut parents: Vec<Name> = segments.into_iter().map(Into::into).collect();
        let Some(terminal) = parents.pop() else {
            return Err(PathSyntaxError::Empty);
        };
        if terminal.is_empty() || parents.iter().any(|s| s.is_empty()) {
            parents.push(terminal);
            return Err(PathSyntaxError::EmptySegment(parents.join(".")));
        }
        Ok(Self { parents, terminal })
    }

    /// Parse a dotted path (`settings.timeout`).
    pub fn parse(dotted: &str) -> Result<Self, PathSyntaxError> {
        if dotted.is_empty() {
            return Err(PathSyntaxError::Empty);
        }
        Self::new(dotted.split('.'))
    }

    pub fn segments(&self) -> impl Iterator<Item = &Name> + '_ {
        self.parents.iter().chain(std::iter::once(&self.terminal))
    }

    /// Every segment but the last.
    pub fn parents(&self) -> &[Name] {
        &self.parents
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    /// `self` followed by `suffix`.
    pub fn join(&self, suffix: &PropertyPath) -> PropertyPath {
        let mut parents = self.parents.clone();
        parents.push(self.terminal.clone());
        parents.extend(suffix.parents.iter().cloned());
        PropertyPath {
            parents,
            terminal: suffix.terminal.clone(),
        }
    }

    /// True if one path is a (non-strict) prefix of the other.
    pub fn overlaps(&self, other: &PropertyPath) -> bool {
        self.segments().zip(other.segments()).all(|(a, b)| a == b)
    }
}

impl std::fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.parents {
            write!(f, "{segment}.")?;
        }
        f.write_str(&self.terminal)
    }
}

impl Serialize for PropertyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.segments())
    }
}

/// One visited field along a resolved path.
#[derive(Debug, Clone, Copy)]
pub struct PathStep<'a> {
    pub owner: &'a MessageSchema,
    pub field: &'a FieldDescriptor,
}

/// Every field visited while resolving a path.
#[derive(Debug, Clone)]
pub struct ResolvedSteps<'a> {
    /// Singular message fields descended through, root first.
    pub parents: Vec<PathStep<'a>>,
    pub terminal: PathStep<'a>,
}

impl<'a> ResolvedSteps<'a> {
    /// Root first, terminal last.
    pub fn to_vec(&self) -> Vec<PathStep<'a>> {
        let mut steps = self.parents.clone();
        steps.push(self.terminal);
        steps
    }
}

/// Resolution result of a `PropertyPath`: the terminal field, the message that
/// owns it, and the semantic type exposed to callers.
#[derive(Debug, Clone)]
pub struct ProtoFieldInfo<'a> {
    pub path: PropertyPath,
    pub field: &'a FieldDescriptor,
    pub owner: &'a MessageSchema,
}

impl<'a> ProtoFieldInfo<'a> {
    pub fn ty(&self) -> &'a FieldKind {
        &self.field.kind
    }
}

/// Resolve `path` starting at `root`.
///
/// Every non-terminal segment must name a singular message field; the
/// terminal may be of any kind.
pub fn resolve<'a, S>(
    schema: &'a S,
    root: &'a MessageSchema,
    path: &PropertyPath,
) -> Result<ProtoFieldInfo<'a>, ResolutionError>
where
    S: SchemaAccessor + ?Sized,
{
    let PathStep { owner, field } = resolve_steps(schema, root, path)?.terminal;
    Ok(ProtoFieldInfo {
        path: path.clone(),
        field,
        owner,
    })
}

/// Like `resolve`, but keeps every visited `(owner, field)` pair.
pub fn resolve_steps<'a, S>(
    schema: &'a S,
    root: &'a MessageSchema,
    path: &PropertyPath,
) -> Result<ResolvedSteps<'a>, ResolutionError>
where
    S: SchemaAccessor + ?Sized,
{
    let lookup = |owner: &'a MessageSchema, segment: &str| {
        schema
            .lookup_field(owner, segment)
            .ok_or_else(|| ResolutionError::UnknownField {
                message: owner.name.clone(),
                field: segment.to_string(),
            })
    };

    let mut parents = Vec::with_capacity(path.parents().len());
    let mut current = root;
    for segment in path.parents() {
        let field = lookup(current, segment)?;
        let kind = schema.field_kind(field);
        let Some(message_name) = kind.message_name() else {
            return Err(ResolutionError::InvalidPathSegment {
                message: current.name.clone(),
                segment: segment.clone(),
                kind: kind.label(),
            });
        };
        let next = schema
            .referenced_message(field)
            .ok_or_else(|| ResolutionError::UnknownMessage(message_name.to_string()))?;
        parents.push(PathStep {
            owner: current,
            field,
        });
        current = next;
    }

    let field = lookup(current, path.terminal())?;
    Ok(ResolvedSteps {
        parents,
        terminal: PathStep {
            owner: current,
            field,
        },
    })
}
