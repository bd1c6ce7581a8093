//! TS server command names and request argument shapes.
//!
//! The back-end speaks its own JSON request protocol keyed by file paths.
//! Positions on this wire are one-based `{line, offset}` pairs, unlike the
//! zero-based LSP coordinates the editor delivers.

use serde::Serialize;

use crate::document::{ContentChange, Position};

/// Command names, fixed by the back-end protocol.
pub mod command {
    pub const OPEN: &str = "open";
    pub const CLOSE: &str = "close";
    pub const CHANGE: &str = "change";
    pub const UPDATE_OPEN: &str = "updateOpen";
    pub const GETERR: &str = "geterr";
    pub const GETERR_FOR_PROJECT: &str = "geterrForProject";
}

/// Script kind hint sent with `open`, derived from the LSP language id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScriptKindName {
    Ts,
    Tsx,
    Js,
    Jsx,
}

impl ScriptKindName {
    /// Returns `None` for language ids without a defined script kind; the
    /// field is then omitted from the wire and the back-end infers one.
    #[must_use]
    pub fn from_language_id(language_id: &str) -> Option<Self> {
        match language_id {
            "typescript" => Some(Self::Ts),
            "typescriptreact" => Some(Self::Tsx),
            "javascript" => Some(Self::Js),
            "javascriptreact" => Some(Self::Jsx),
            _ => None,
        }
    }
}

/// Arguments for `open`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequestArgs {
    pub file: String,
    pub file_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_kind_name: Option<ScriptKindName>,
}

/// Arguments for commands that name a single file (`close`).
#[derive(Debug, Clone, Serialize)]
pub struct FileRequestArgs {
    pub file: String,
}

/// Arguments for a legacy per-edit `change` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequestArgs {
    pub file: String,
    pub line: u32,
    pub offset: u32,
    pub end_line: u32,
    pub end_offset: u32,
    pub insert_string: String,
}

impl ChangeRequestArgs {
    #[must_use]
    pub fn new(file: &str, change: &ContentChange) -> Self {
        let start = Location::from_position(change.range.start);
        let end = Location::from_position(change.range.end);
        Self {
            file: file.to_string(),
            line: start.line,
            offset: start.offset,
            end_line: end.line,
            end_offset: end.offset,
            insert_string: change.text.clone(),
        }
    }
}

/// One-based position on the back-end wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: u32,
    pub offset: u32,
}

impl Location {
    #[must_use]
    pub fn from_position(position: Position) -> Self {
        Self {
            line: position.line + 1,
            offset: position.character + 1,
        }
    }
}

/// One text edit within a batched change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEdit {
    pub start: Location,
    pub end: Location,
    pub new_text: String,
}

impl CodeEdit {
    #[must_use]
    pub fn from_content_change(change: &ContentChange) -> Self {
        Self {
            start: Location::from_position(change.range.start),
            end: Location::from_position(change.range.end),
            new_text: change.text.clone(),
        }
    }
}

/// Edits for one file within an `updateOpen` batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCodeEdits {
    pub file_name: String,
    pub text_changes: Vec<CodeEdit>,
}

/// Arguments for `updateOpen`, carrying one whole coalesced batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOpenRequestArgs {
    pub changed_files: Vec<FileCodeEdits>,
    pub closed_files: Vec<String>,
    pub open_files: Vec<OpenRequestArgs>,
}

impl UpdateOpenRequestArgs {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed_files.is_empty() && self.closed_files.is_empty() && self.open_files.is_empty()
    }
}

/// Arguments for `geterr`.
#[derive(Debug, Clone, Serialize)]
pub struct GeterrRequestArgs {
    pub delay: u32,
    pub files: Vec<String>,
}

/// Arguments for `geterrForProject`.
#[derive(Debug, Clone, Serialize)]
pub struct GeterrForProjectRequestArgs {
    pub delay: u32,
    pub file: String,
}

/// Serialize command arguments, logging instead of failing.
///
/// Argument types are plain data and serialize infallibly in practice; a
/// failure here means the command is dropped, which the next diagnostics
/// cycle absorbs.
pub(crate) fn args_value<T: Serialize>(command: &str, args: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(args) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(command, %error, "failed to serialize command arguments");
            None
        }
    }
}
