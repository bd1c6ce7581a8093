//! Per-file buffer state machine.

use std::sync::Arc;

use url::Url;

use crate::client::TsServerClient;
use crate::document::{ContentChange, TextDocument};
use crate::protocol::{OpenRequestArgs, ScriptKindName};
use crate::synchronizer::BufferSynchronizer;

/// Lifecycle of a synced buffer. `Closed` is terminal; reopening a file
/// creates a fresh buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferState {
    Initial,
    Open,
    Closed,
}

/// Language family of a buffer, used to pick the matching validation
/// setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferKind {
    TypeScript,
    JavaScript,
}

impl BufferKind {
    pub fn from_language_id(language_id: &str) -> Self {
        match language_id {
            "javascript" | "javascriptreact" => Self::JavaScript,
            _ => Self::TypeScript,
        }
    }
}

/// Local record of one editor document mirrored into the back-end.
pub(crate) struct SyncedBuffer {
    document: Arc<dyn TextDocument>,
    resource: Url,
    filepath: String,
    state: BufferState,
}

impl SyncedBuffer {
    pub fn new(document: Arc<dyn TextDocument>, filepath: String) -> Self {
        let resource = document.uri().clone();
        Self {
            document,
            resource,
            filepath,
            state: BufferState::Initial,
        }
    }

    pub fn resource(&self) -> &Url {
        &self.resource
    }

    pub fn kind(&self) -> BufferKind {
        BufferKind::from_language_id(self.document.language_id())
    }

    pub fn line_count(&self) -> u32 {
        self.document.line_count()
    }

    /// Announce the buffer to the back-end with its current content.
    ///
    /// Also used on reinitialization, when the restarted back-end must be
    /// told about every tracked buffer again.
    pub fn open(&mut self, client: &dyn TsServerClient, synchronizer: &mut BufferSynchronizer) {
        let args = OpenRequestArgs {
            file: self.filepath.clone(),
            file_content: self.document.text(),
            project_root_path: client.workspace_root_for_resource(&self.resource),
            script_kind_name: ScriptKindName::from_language_id(self.document.language_id()),
        };
        synchronizer.open(&self.resource, args);
        self.state = BufferState::Open;
    }

    /// Returns whether the back-end observed the buffer as open.
    pub fn close(&mut self, synchronizer: &mut BufferSynchronizer) -> bool {
        if self.state != BufferState::Open {
            self.state = BufferState::Closed;
            return false;
        }
        self.state = BufferState::Closed;
        synchronizer.close(&self.resource, &self.filepath)
    }

    pub fn on_content_changed(
        &mut self,
        changes: &[ContentChange],
        synchronizer: &mut BufferSynchronizer,
    ) {
        if changes.is_empty() {
            return;
        }
        if self.state != BufferState::Open {
            tracing::warn!(
                resource = %self.resource,
                state = ?self.state,
                "content change for a buffer that is not open"
            );
        }
        synchronizer.change(&self.resource, &self.filepath, changes);
    }
}
