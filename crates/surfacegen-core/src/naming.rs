//! Target naming and per-pass name disambiguation.

use heck::ToSnakeCase;
use std::collections::{BTreeMap, BTreeSet};
use surfacegen_schema::MethodDescriptor;

/// How schema names turn into names in the generated surface.
pub trait SurfaceNaming {
    /// Client method name for an RPC (`ListBooks` → `list_books`).
    fn method_name(&self, rpc: &str) -> String;

    /// Parameter name for a flattened field.
    fn parameter_name(&self, field: &str) -> String;

    /// Accessor used to read one field off a message.
    fn accessor_name(&self, field: &str) -> String;

    /// Test name for a client method.
    fn test_name(&self, method_name: &str) -> String;

    /// Name of the whole-request parameter.
    fn request_parameter_name(&self) -> String {
        "request".to_string()
    }

    /// Name of the test double standing in for `subject`.
    fn double_name(&self, subject: &str) -> String {
        format!("mock_{subject}")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCaseNaming;

impl SurfaceNaming for SnakeCaseNaming {
    fn method_name(&self, rpc: &str) -> String {
        rpc.to_snake_case()
    }

    fn parameter_name(&self, field: &str) -> String {
        field.to_snake_case()
    }

    fn accessor_name(&self, field: &str) -> String {
        field.to_snake_case()
    }

    fn test_name(&self, method_name: &str) -> String {
        format!("{method_name}_test")
    }
}

/// Hands out unique generated names for one generation pass.
///
/// Claims are counted per canonical method identity, so successive variants
/// of the same RPC get `base`, `base2`, `base3`, ... Names are also unique
/// within a service, so two RPCs that snake-case to the same name cannot
/// collide either.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    ordinals: BTreeMap<String, BTreeMap<String, usize>>,
    taken: BTreeSet<(String, String)>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, method: &MethodDescriptor, base: &str) -> String {
        let ordinal = self
            .ordinals
            .entry(method.identity())
            .or_default()
            .entry(base.to_string())
            .or_insert(0);
        loop {
            *ordinal += 1;
            let candidate = if *ordinal == 1 {
                base.to_string()
            } else {
                format!("{base}{ordinal}")
            };
            if self.taken.insert((method.service.clone(), candidate.clone())) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_cases_rpc_names() {
        let naming = SnakeCaseNaming;
        assert_eq!(naming.method_name("ListBooks"), "list_books");
        assert_eq!(naming.method_name("GetHTTPConfig"), "get_http_config");
        assert_eq!(naming.parameter_name("page_size"), "page_size");
        assert_eq!(naming.method_name("V2Migrate"), "v2_migrate");
        assert_eq!(naming.accessor_name("displayName"), "display_name");
    }

    #[test]
    fn registry_numbers_repeat_claims_per_method() {
        let mut registry = NameRegistry::new();
        let m = MethodDescriptor::unary("pkg.Library", "ListBooks", "pkg.Req", "pkg.Resp");
        assert_eq!(registry.claim(&m, "list_books_test"), "list_books_test");
        assert_eq!(registry.claim(&m, "list_books_test"), "list_books_test2");
        assert_eq!(registry.claim(&m, "list_books_test"), "list_books_test3");
    }

    #[test]
    fn registry_keeps_names_unique_within_a_service() {
        let mut registry = NameRegistry::new();
        let a = MethodDescriptor::unary("pkg.Svc", "GetHTTP", "pkg.Req", "pkg.Resp");
        let b = MethodDescriptor::unary("pkg.Svc", "GetHttp", "pkg.Req", "pkg.Resp");
        let c = MethodDescriptor::unary("pkg.Other", "GetHttp", "pkg.Req", "pkg.Resp");
        assert_eq!(registry.claim(&a, "get_http"), "get_http");
        assert_eq!(registry.claim(&b, "get_http"), "get_http2");
        assert_eq!(registry.claim(&c, "get_http"), "get_http");
    }

    #[test]
    fn fresh_registries_do_not_share_state() {
        let m = MethodDescriptor::unary("pkg.Svc", "Get", "pkg.Req", "pkg.Resp");
        let mut first = NameRegistry::new();
        let mut second = NameRegistry::new();
        assert_eq!(first.claim(&m, "get"), "get");
        assert_eq!(second.claim(&m, "get"), "get");
    }
}
