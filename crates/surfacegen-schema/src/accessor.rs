//! The read-only view of a schema that the generator traverses.
//!
//! The generator never owns schema data: every lookup hands back a reference
//! tied to the accessor, so resolved bindings cannot outlive the schema they
//! were resolved against.

use crate::model::{
    ElementType, FieldDescriptor, FieldKind, MessageSchema, SchemaSet, ServiceDescriptor,
};

pub trait SchemaAccessor {
    fn message(&self, name: &str) -> Option<&MessageSchema>;

    /// Declared values of an enum, in declaration order. `None` when the enum
    /// is unknown to the schema.
    fn enum_values(&self, enum_name: &str) -> Option<&[String]>;

    fn services(&self) -> &[ServiceDescriptor];

    fn lookup_field<'a>(
        &self,
        message: &'a MessageSchema,
        name: &str,
    ) -> Option<&'a FieldDescriptor> {
        message.field(name)
    }

    fn field_kind<'a>(&self, field: &'a FieldDescriptor) -> &'a FieldKind {
        &field.kind
    }

    /// The message a message-kind field points at. `None` for every other
    /// kind, and for message fields whose type is not in the schema.
    fn referenced_message(&self, field: &FieldDescriptor) -> Option<&MessageSchema> {
        field
            .kind
            .message_name()
            .and_then(|name| self.message(name))
    }

    /// Like `referenced_message`, for a repeated element or map value type.
    fn element_message(&self, element: &ElementType) -> Option<&MessageSchema> {
        match element {
            ElementType::Message { message_name } => self.message(message_name),
            _ => None,
        }
    }
}

impl SchemaAccessor for SchemaSet {
    fn message(&self, name: &str) -> Option<&MessageSchema> {
        self.messages.get(name)
    }

    fn enum_values(&self, enum_name: &str) -> Option<&[String]> {
        self.enums.get(enum_name).map(|e| e.values.as_slice())
    }

    fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }
}
