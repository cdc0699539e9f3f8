//! Method shape resolution.
//!
//! The shape is the single place where streaming kind, flattening, paging and
//! long-running status are combined. Everything downstream switches on the
//! resulting `MethodShape` instead of re-deriving it from the descriptor.

use crate::error::{ShapeConflict, ShapeConflictError};
use crate::options::{FlatteningConfig, PagedResponse};
use serde::Serialize;
use surfacegen_schema::MethodDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingKind {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl StreamingKind {
    pub fn from_flags(client_streaming: bool, server_streaming: bool) -> Self {
        match (client_streaming, server_streaming) {
            (true, true) => StreamingKind::BidiStreaming,
            (true, false) => StreamingKind::ClientStreaming,
            (false, true) => StreamingKind::ServerStreaming,
            (false, false) => StreamingKind::Unary,
        }
    }

    /// The caller receives a stream of response messages.
    pub fn streams_responses(self) -> bool {
        matches!(
            self,
            StreamingKind::ServerStreaming | StreamingKind::BidiStreaming
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            StreamingKind::Unary => "unary",
            StreamingKind::ClientStreaming => "client_streaming",
            StreamingKind::ServerStreaming => "server_streaming",
            StreamingKind::BidiStreaming => "bidi_streaming",
        }
    }
}

impl std::fmt::Display for StreamingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MethodShape {
    pub streaming: StreamingKind,
    pub flattened: bool,
    pub paged: bool,
    pub long_running: bool,
}

impl std::fmt::Display for MethodShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.streaming)?;
        if self.flattened {
            write!(f, "+flattened")?;
        }
        if self.paged {
            write!(f, "+paged")?;
        }
        if self.long_running {
            write!(f, "+long_running")?;
        }
        Ok(())
    }
}

/// Classify a method.
///
/// Rules, in order:
/// 1. streaming kind from the two independent flags
/// 2. `flattened` iff a flattening config with at least one path is given
/// 3. `paged` iff paging is configured; only unary methods may page
/// 4. `long_running` is the given marker; it excludes paging, and only unary
///    methods may be long-running
///
/// Flattening combines with every streaming kind. For request-streaming
/// methods the flattened leaves build the first request of the stream.
pub fn classify(
    method: &MethodDescriptor,
    flatten: Option<&FlatteningConfig>,
    paging: Option<&PagedResponse>,
    long_running: bool,
) -> Result<MethodShape, ShapeConflictError> {
    let conflict = |conflict| ShapeConflictError {
        method: method.identity(),
        conflict,
    };

    let streaming = StreamingKind::from_flags(method.client_streaming, method.server_streaming);
    let flattened = flatten.is_some_and(|f| !f.is_empty());
    let paged = paging.is_some();

    if paged && streaming != StreamingKind::Unary {
        return Err(conflict(ShapeConflict::PagedStreaming(streaming)));
    }
    if long_running && paged {
        return Err(conflict(ShapeConflict::PagedLongRunning));
    }
    if long_running && streaming != StreamingKind::Unary {
        return Err(conflict(ShapeConflict::LongRunningStreaming(streaming)));
    }

    tracing::debug!(
        method = %method.identity(),
        %streaming,
        flattened,
        paged,
        long_running,
        "classified method"
    );

    Ok(MethodShape {
        streaming,
        flattened,
        paged,
        long_running,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(client: bool, server: bool) -> MethodDescriptor {
        MethodDescriptor::unary("pkg.Svc", "Call", "pkg.Req", "pkg.Resp").with_streaming(client, server)
    }

    fn paging() -> PagedResponse {
        PagedResponse {
            page_size_field: "page_size".to_string(),
            next_page_token_field: "next_page_token".to_string(),
            resources_field: "items".to_string(),
        }
    }

    #[test]
    fn streaming_kind_follows_flags() {
        assert_eq!(StreamingKind::from_flags(false, false), StreamingKind::Unary);
        assert_eq!(StreamingKind::from_flags(true, false), StreamingKind::ClientStreaming);
        assert_eq!(StreamingKind::from_flags(false, true), StreamingKind::ServerStreaming);
        assert_eq!(StreamingKind::from_flags(true, true), StreamingKind::BidiStreaming);
    }

    #[test]
    fn empty_flattening_is_not_flattened() {
        let shape = classify(&method(false, false), Some(&FlatteningConfig::default()), None, false)
            .expect("shape");
        assert!(!shape.flattened);

        let flat = FlatteningConfig::from_dotted(["name"]).expect("paths");
        let shape = classify(&method(false, false), Some(&flat), None, false).expect("shape");
        assert!(shape.flattened);
    }

    #[test]
    fn unary_paged_method() {
        let shape = classify(&method(false, false), None, Some(&paging()), false).expect("shape");
        assert_eq!(
            shape,
            MethodShape {
                streaming: StreamingKind::Unary,
                flattened: false,
                paged: true,
                long_running: false,
            }
        );
        assert_eq!(shape.to_string(), "unary+paged");
    }

    #[test]
    fn bidi_paged_method_conflicts() {
        let err = classify(&method(true, true), None, Some(&paging()), false).expect_err("conflict");
        assert_eq!(
            err.conflict,
            ShapeConflict::PagedStreaming(StreamingKind::BidiStreaming)
        );
        assert_eq!(err.method, "pkg.Svc/Call");
    }

    #[test]
    fn paged_long_running_conflicts() {
        let err = classify(&method(false, false), None, Some(&paging()), true).expect_err("conflict");
        assert_eq!(err.conflict, ShapeConflict::PagedLongRunning);
    }

    #[test]
    fn streaming_long_running_conflicts() {
        let err = classify(&method(false, true), None, None, true).expect_err("conflict");
        assert_eq!(
            err.conflict,
            ShapeConflict::LongRunningStreaming(StreamingKind::ServerStreaming)
        );
    }

    #[test]
    fn every_streaming_kind_may_be_flattened() {
        let flat = FlatteningConfig::from_dotted(["name"]).expect("paths");
        for (client, server) in [(false, false), (true, false), (false, true), (true, true)] {
            let shape = classify(&method(client, server), Some(&flat), None, false).expect("shape");
            assert!(shape.flattened);
            assert_eq!(shape.streaming, StreamingKind::from_flags(client, server));
        }
        let shape = classify(&method(true, false), Some(&flat), None, false).expect("shape");
        assert_eq!(shape.to_string(), "client_streaming+flattened");
    }
}
