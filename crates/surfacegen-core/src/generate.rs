//! The batch generation pass.
//!
//! Walks every method of every service, fans each method out into its
//! variants (request object plus one per flattening group), and runs
//! classify → bind → project → replay for each. A failure anywhere excludes
//! the whole method with a diagnostic; the pass itself never fails.

use crate::binder::bind;
use crate::error::{ProjectionError, SurfaceError};
use crate::naming::{NameRegistry, SnakeCaseNaming, SurfaceNaming};
use crate::options::{FlatteningConfig, MethodOptions};
use crate::projector::{project, CallDescriptor, VerificationDescriptor};
use crate::replay;
use crate::shape::{classify, MethodShape};
use serde::Serialize;
use surfacegen_schema::config::ClientConfigV1;
use surfacegen_schema::{MethodDescriptor, SchemaAccessor};

pub const GENERATION_REPORT_VERSION_V1: u32 = 1;

// ============================================================================
// Report model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum SurfaceVariant {
    /// Takes the whole request message.
    RequestObject,
    /// Takes the leaves of flattening group `group`.
    Flattened { group: usize },
}

impl std::fmt::Display for SurfaceVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceVariant::RequestObject => write!(f, "request_object"),
            SurfaceVariant::Flattened { group } => write!(f, "flattened[{group}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSurface {
    pub method: String,
    pub variant: SurfaceVariant,
    pub shape: MethodShape,
    pub call: CallDescriptor,
    pub verification: VerificationDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub kind: String,
    pub message: String,
}

impl From<&SurfaceError> for Diagnostic {
    fn from(err: &SurfaceError) -> Self {
        Self {
            method: err.method().to_string(),
            path: err.path().map(str::to_string),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub services: usize,
    pub methods: usize,
    pub surfaces: usize,
    pub excluded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub version: u32,
    /// `sha256:<hex>` of the schema input, when the caller knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_digest: Option<String>,
    pub surfaces: Vec<MethodSurface>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: GenerationStats,
}

impl GenerationReport {
    pub fn with_input_digest(mut self, digest: impl Into<String>) -> Self {
        self.input_digest = Some(digest.into());
        self
    }

    /// True when no method was excluded and no config entry dangled.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn surfaces_for<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a MethodSurface> + 'a {
        self.surfaces.iter().filter(move |s| s.method == method)
    }
}

// ============================================================================
// Generator
// ============================================================================

pub struct Generator<'s, S: ?Sized, N = SnakeCaseNaming> {
    schema: &'s S,
    config: &'s ClientConfigV1,
    naming: N,
}

impl<'s, S: SchemaAccessor + ?Sized> Generator<'s, S> {
    pub fn new(schema: &'s S, config: &'s ClientConfigV1) -> Self {
        Self {
            schema,
            config,
            naming: SnakeCaseNaming,
        }
    }
}

impl<'s, S, N> Generator<'s, S, N>
where
    S: SchemaAccessor + ?Sized,
    N: SurfaceNaming,
{
    pub fn with_naming<M: SurfaceNaming>(self, naming: M) -> Generator<'s, S, M> {
        Generator {
            schema: self.schema,
            config: self.config,
            naming,
        }
    }

    /// Run one pass over the whole schema. Each call starts from a fresh
    /// name registry.
    pub fn run(&self) -> GenerationReport {
        let mut registry = NameRegistry::new();
        let mut surfaces = Vec::new();
        let mut diagnostics = Vec::new();
        let mut stats = GenerationStats {
            services: self.schema.services().len(),
            ..GenerationStats::default()
        };

        for service in self.schema.services() {
            for method in &service.methods {
                stats.methods += 1;
                match self.method_surfaces(method, &mut registry) {
                    Ok(mut produced) => surfaces.append(&mut produced),
                    Err(err) => {
                        tracing::warn!(
                            method = %err.method(),
                            kind = err.kind(),
                            "excluding method: {err}"
                        );
                        stats.excluded += 1;
                        diagnostics.push(Diagnostic::from(&err));
                    }
                }
            }
        }

        for err in self.dangling_config_entries() {
            tracing::warn!(method = %err.method(), "{err}");
            diagnostics.push(Diagnostic::from(&err));
        }

        stats.surfaces = surfaces.len();
        tracing::info!(
            services = stats.services,
            methods = stats.methods,
            surfaces = stats.surfaces,
            excluded = stats.excluded,
            "generation pass finished"
        );

        GenerationReport {
            version: GENERATION_REPORT_VERSION_V1,
            input_digest: None,
            surfaces,
            diagnostics,
            stats,
        }
    }

    /// Every surface of one method, or the first error that excludes it.
    ///
    /// Names are claimed on a copy of `registry` that only replaces the
    /// original once every variant has succeeded.
    pub fn method_surfaces(
        &self,
        method: &MethodDescriptor,
        registry: &mut NameRegistry,
    ) -> Result<Vec<MethodSurface>, SurfaceError> {
        let config = self.config.method(&method.service, &method.name);
        let options = MethodOptions::from_config(config);

        let groups = config
            .and_then(|c| c.flattening.as_ref())
            .map(|f| f.groups.as_slice())
            .unwrap_or_default()
            .iter()
            .map(FlatteningConfig::from_group)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|cause| SurfaceError::Config {
                method: method.identity(),
                cause,
            })?;
        let request_object = groups.is_empty() || config.map_or(true, |c| c.request_object_method);

        let mut variants: Vec<(SurfaceVariant, Option<&FlatteningConfig>)> = Vec::new();
        if request_object {
            variants.push((SurfaceVariant::RequestObject, None));
        }
        variants.extend(
            groups
                .iter()
                .enumerate()
                .map(|(group, g)| (SurfaceVariant::Flattened { group }, Some(g))),
        );

        let mut scratch = registry.clone();
        let mut surfaces = Vec::with_capacity(variants.len());
        for (variant, flatten) in variants {
            let shape = classify(
                method,
                flatten,
                options.paging.as_ref(),
                options.is_long_running(),
            )?;
            let binding = bind(
                self.schema,
                method,
                &shape,
                flatten,
                options.paging.as_ref(),
                &self.naming,
            )?;
            let (call, verification) = project(
                method,
                &shape,
                &binding,
                options.long_running.as_ref(),
                &self.naming,
                &mut scratch,
            )?;
            self_check(&call, &verification)?;
            surfaces.push(MethodSurface {
                method: method.identity(),
                variant,
                shape,
                call,
                verification,
            });
        }

        *registry = scratch;
        Ok(surfaces)
    }

    /// Config entries that name a service or method the schema lacks.
    fn dangling_config_entries(&self) -> Vec<SurfaceError> {
        let mut out = Vec::new();
        for service in &self.config.services {
            let known = self
                .schema
                .services()
                .iter()
                .find(|s| s.name == service.name);
            for method in &service.methods {
                if known.and_then(|s| s.method(&method.name)).is_none() {
                    out.push(SurfaceError::UnknownMethod {
                        method: format!("{}/{}", service.name, method.name),
                    });
                }
            }
        }
        out
    }
}

fn self_check(call: &CallDescriptor, verification: &VerificationDescriptor) -> Result<(), ProjectionError> {
    let fail = |detail: String| ProjectionError {
        method: call.method.clone(),
        detail,
    };
    let mismatches = replay::verify(call, verification).map_err(|e| fail(e.to_string()))?;
    if mismatches.is_empty() {
        return Ok(());
    }
    let detail = mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(fail(detail))
}
