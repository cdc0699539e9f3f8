//! Client configuration (`ClientConfigV1`).
//!
//! The config carries everything the schema itself cannot express about a
//! method's calling convention:
//!
//! - flattening groups (which nested fields become top-level parameters)
//! - page streaming (page-size / next-page-token / resources fields)
//! - long-running markers (response and metadata types of the operation)
//!
//! Canonical JSON form:
//!
//! ```json
//! {
//!   "version": 1,
//!   "services": [{
//!     "name": "library.v1.Library",
//!     "methods": [{
//!       "name": "UpdateShelf",
//!       "flattening": { "groups": [{ "parameters": ["name", "settings.timeout"] }] }
//!     }]
//!   }]
//! }
//! ```
//!
//! A flattened parameter may also be written as an object with `nested`
//! sub-paths, resolved relative to the message its `path` ends at:
//!
//! ```json
//! { "path": "settings", "nested": ["timeout", "retry.max_attempts"] }
//! ```

use crate::model::Name;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CLIENT_CONFIG_VERSION_V1: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse client config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported client config version {found} (expected 1)")]
    UnsupportedVersion { found: u32 },
    #[error("{method}: invalid flattened path `{path}`: {reason}")]
    InvalidPath {
        method: String,
        path: String,
        reason: String,
    },
    #[error("{method}: flattening group {group} is empty")]
    EmptyGroup { method: String, group: usize },
    #[error("duplicate config for `{0}`")]
    DuplicateEntry(String),
}

// ============================================================================
// Document model
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfigV1 {
    pub version: u32,
    #[serde(default)]
    pub services: Vec<ServiceConfigV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfigV1 {
    /// Fully-qualified service name (`library.v1.Library`).
    pub name: Name,
    #[serde(default)]
    pub methods: Vec<MethodConfigV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MethodConfigV1 {
    pub name: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flattening: Option<FlatteningConfigV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_streaming: Option<PageStreamingConfigV1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_running: Option<LongRunningConfigV1>,
    /// Also produce the whole-request-message variant next to the flattened
    /// ones.
    #[serde(default = "default_true")]
    pub request_object_method: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FlatteningConfigV1 {
    pub groups: Vec<FlatteningGroupV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FlatteningGroupV1 {
    pub parameters: Vec<FlattenedPathV1>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FlattenedPathV1 {
    Dotted(String),
    Nested {
        path: String,
        #[serde(default)]
        nested: Vec<FlattenedPathV1>,
    },
}

impl FlattenedPathV1 {
    pub fn path(&self) -> &str {
        match self {
            FlattenedPathV1::Dotted(path) => path,
            FlattenedPathV1::Nested { path, .. } => path,
        }
    }

    pub fn nested(&self) -> &[FlattenedPathV1] {
        match self {
            FlattenedPathV1::Dotted(_) => &[],
            FlattenedPathV1::Nested { nested, .. } => nested,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PageStreamingConfigV1 {
    /// Page-size field on the request message.
    pub request_page_size_field: Name,
    /// Next-page-token field on the response message.
    pub response_token_field: Name,
    /// Repeated field on the response message holding the page's items.
    pub resources_field: Name,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LongRunningConfigV1 {
    pub response_type: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_type: Option<Name>,
}

// ============================================================================
// Loading + lookup
// ============================================================================

impl ClientConfigV1 {
    pub fn empty() -> Self {
        Self {
            version: CLIENT_CONFIG_VERSION_V1,
            services: Vec::new(),
        }
    }

    /// Parse and validate a config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ClientConfigV1 = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CLIENT_CONFIG_VERSION_V1 {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
            });
        }

        let mut seen = std::collections::HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateEntry(service.name.clone()));
            }
            let mut seen_methods = std::collections::HashSet::new();
            for method in &service.methods {
                let id = format!("{}/{}", service.name, method.name);
                if !seen_methods.insert(method.name.as_str()) {
                    return Err(ConfigError::DuplicateEntry(id));
                }
                let Some(flattening) = &method.flattening else {
                    continue;
                };
                for (group_idx, group) in flattening.groups.iter().enumerate() {
                    if group.parameters.is_empty() {
                        return Err(ConfigError::EmptyGroup {
                            method: id,
                            group: group_idx,
                        });
                    }
                    for p in &group.parameters {
                        validate_flattened_path(&id, p)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn method(&self, service: &str, method: &str) -> Option<&MethodConfigV1> {
        self.services
            .iter()
            .find(|s| s.name == service)
            .and_then(|s| s.methods.iter().find(|m| m.name == method))
    }
}

fn validate_flattened_path(method: &str, p: &FlattenedPathV1) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPath {
        method: method.to_string(),
        path: p.path().to_string(),
        reason: reason.to_string(),
    };

    if p.path().is_empty() {
        return Err(invalid("path is empty"));
    }
    for segment in p.path().split('.') {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !is_field_ident(segment) {
            return Err(invalid("segments must be field identifiers"));
        }
    }
    for nested in p.nested() {
        validate_flattened_path(method, nested)?;
    }
    Ok(())
}

fn is_field_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
