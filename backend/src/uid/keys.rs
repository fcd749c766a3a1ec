//! Well-known request keys and request kinds

use super::RawStringValue;

/// Common keys of sourcekitd request dictionaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKitKey {
    Request,
    SourceFile,
    SourceText,
    Offset,
    Length,
    CompilerArgs,
    Name,
    Usr,
    Line,
    Column,
    EnableSyntaxMap,
    EnableSubstructure,
    SyntacticOnly,
    Cancellable,
}

impl RawStringValue for SourceKitKey {
    fn raw_value(&self) -> &str {
        match self {
            SourceKitKey::Request => "key.request",
            SourceKitKey::SourceFile => "key.sourcefile",
            SourceKitKey::SourceText => "key.sourcetext",
            SourceKitKey::Offset => "key.offset",
            SourceKitKey::Length => "key.length",
            SourceKitKey::CompilerArgs => "key.compilerargs",
            SourceKitKey::Name => "key.name",
            SourceKitKey::Usr => "key.usr",
            SourceKitKey::Line => "key.line",
            SourceKitKey::Column => "key.column",
            SourceKitKey::EnableSyntaxMap => "key.enablesyntaxmap",
            SourceKitKey::EnableSubstructure => "key.enablesubstructure",
            SourceKitKey::SyntacticOnly => "key.syntactic_only",
            SourceKitKey::Cancellable => "key.cancelable",
        }
    }
}

/// Values of `key.request`
///
/// Converts to a UID object, so it can be stored directly:
/// ```
/// use std::sync::Arc;
/// use sourcekitd_object::{MemoryRuntime, RequestKind, SourceKit, SourceKitKey, SourceKitObject};
///
/// let sk = SourceKit::new(Arc::new(MemoryRuntime::new()));
/// let request = SourceKitObject::from_pairs(&sk, Vec::<(SourceKitKey, i64)>::new());
/// request.update_value(&RequestKind::CursorInfo, SourceKitKey::Request);
/// assert!(request.description().contains("key.request: source.request.cursorinfo"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    EditorOpen,
    EditorClose,
    EditorReplaceText,
    CursorInfo,
    CodeComplete,
    DocInfo,
    IndexSource,
}

impl RawStringValue for RequestKind {
    fn raw_value(&self) -> &str {
        match self {
            RequestKind::EditorOpen => "source.request.editor.open",
            RequestKind::EditorClose => "source.request.editor.close",
            RequestKind::EditorReplaceText => "source.request.editor.replacetext",
            RequestKind::CursorInfo => "source.request.cursorinfo",
            RequestKind::CodeComplete => "source.request.codecomplete",
            RequestKind::DocInfo => "source.request.docinfo",
            RequestKind::IndexSource => "source.request.indexsource",
        }
    }
}
