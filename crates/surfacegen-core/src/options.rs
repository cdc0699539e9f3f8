//! Per-method generation inputs, in the form the core works with.
//!
//! These are the typed counterparts of the `ClientConfigV1` entries: dotted
//! strings become `PropertyPath`s, and each flattening group becomes one
//! `FlatteningConfig`.

use crate::path::{PathSyntaxError, PropertyPath};
use surfacegen_schema::config::{
    FlattenedPathV1, FlatteningGroupV1, LongRunningConfigV1, MethodConfigV1, PageStreamingConfigV1,
};
use surfacegen_schema::model::Name;

/// One flattened path, optionally carrying sub-paths resolved relative to the
/// message its terminal field points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedPath {
    pub path: PropertyPath,
    pub nested: Vec<FlattenedPath>,
}

impl FlattenedPath {
    pub fn leaf(path: PropertyPath) -> Self {
        Self {
            path,
            nested: Vec::new(),
        }
    }

    pub fn nested(path: PropertyPath, nested: Vec<FlattenedPath>) -> Self {
        Self { path, nested }
    }

    fn from_config(p: &FlattenedPathV1) -> Result<Self, PathSyntaxError> {
        Ok(Self {
            path: PropertyPath::parse(p.path())?,
            nested: p
                .nested()
                .iter()
                .map(Self::from_config)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Ordered flattened paths of one overload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatteningConfig {
    pub paths: Vec<FlattenedPath>,
}

impl FlatteningConfig {
    pub fn new(paths: Vec<FlattenedPath>) -> Self {
        Self { paths }
    }

    /// Convenience for flat (non-nested) groups: `["name", "settings.timeout"]`.
    pub fn from_dotted<'a, I>(paths: I) -> Result<Self, PathSyntaxError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let paths = paths
            .into_iter()
            .map(|p| PropertyPath::parse(p).map(FlattenedPath::leaf))
            .collect::<Result<_, _>>()?;
        Ok(Self { paths })
    }

    pub fn from_group(group: &FlatteningGroupV1) -> Result<Self, PathSyntaxError> {
        let paths = group
            .parameters
            .iter()
            .map(FlattenedPath::from_config)
            .collect::<Result<_, _>>()?;
        Ok(Self { paths })
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Paged-response markers: the page-size input field, the next-page-token
/// output field and the repeated result field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResponse {
    pub page_size_field: Name,
    pub next_page_token_field: Name,
    pub resources_field: Name,
}

impl From<&PageStreamingConfigV1> for PagedResponse {
    fn from(c: &PageStreamingConfigV1) -> Self {
        Self {
            page_size_field: c.request_page_size_field.clone(),
            next_page_token_field: c.response_token_field.clone(),
            resources_field: c.resources_field.clone(),
        }
    }
}

/// What a long-running method's operation handle eventually resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongRunning {
    pub response_type: Name,
    pub metadata_type: Option<Name>,
}

impl From<&LongRunningConfigV1> for LongRunning {
    fn from(c: &LongRunningConfigV1) -> Self {
        Self {
            response_type: c.response_type.clone(),
            metadata_type: c.metadata_type.clone(),
        }
    }
}

/// Everything configured for one method, minus flattening groups (which fan
/// out into separate variants).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodOptions {
    pub paging: Option<PagedResponse>,
    pub long_running: Option<LongRunning>,
}

impl MethodOptions {
    pub fn from_config(config: Option<&MethodConfigV1>) -> Self {
        let Some(config) = config else {
            return Self::default();
        };
        Self {
            paging: config.page_streaming.as_ref().map(PagedResponse::from),
            long_running: config.long_running.as_ref().map(LongRunning::from),
        }
    }

    pub fn is_long_running(&self) -> bool {
        self.long_running.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_nested_config_paths() {
        let group = FlatteningGroupV1 {
            parameters: vec![
                FlattenedPathV1::Dotted("name".to_string()),
                FlattenedPathV1::Nested {
                    path: "settings".to_string(),
                    nested: vec![FlattenedPathV1::Dotted("retry.max_attempts".to_string())],
                },
            ],
        };
        let config = FlatteningConfig::from_group(&group).expect("convert");
        assert_eq!(config.paths.len(), 2);
        assert_eq!(config.paths[1].path.to_string(), "settings");
        let nested = &config.paths[1].nested[0].path;
        assert_eq!(nested.parents(), &["retry".to_string()]);
        assert_eq!(nested.terminal(), "max_attempts");
    }

    #[test]
    fn missing_method_config_means_no_markers() {
        let options = MethodOptions::from_config(None);
        assert!(options.paging.is_none());
        assert!(!options.is_long_running());
    }
}
