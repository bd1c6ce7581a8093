//! Editor-side document interface and change event shapes.
//!
//! The adapter never stores document text itself. The editor layer hands it
//! a [`TextDocument`] view per open file and streams incremental
//! [`ContentChange`]s; both are forwarded to the back-end opaquely.

use serde::{Deserialize, Serialize};
use url::Url;

/// View of one open editor document.
///
/// Implementations are owned by the LSP layer and stay live for as long as
/// the document is open; `text` and `line_count` reflect the current
/// content whenever they are called (buffers re-read them when the
/// back-end restarts).
pub trait TextDocument: Send + Sync {
    fn uri(&self) -> &Url;

    /// LSP language identifier, e.g. `"typescript"` or `"javascriptreact"`.
    fn language_id(&self) -> &str;

    /// Snapshot of the full document content.
    fn text(&self) -> String;

    fn line_count(&self) -> u32;
}

/// Zero-based position within a document, in LSP coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// One incremental content change from a `didChange` notification.
///
/// The adapter registers for incremental document sync, so every change
/// carries the range it replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    pub range: Range,
    pub text: String,
}
