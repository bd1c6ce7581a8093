//! Coalesces per-file buffer operations into batched back-end requests.
//!
//! From protocol 3.4 the back-end accepts one `updateOpen` request carrying
//! any mix of opens, closes and edits. The synchronizer keeps at most one
//! pending operation per resource and flushes the whole batch whenever
//! ordering would otherwise be lost. Older back-ends get each operation
//! forwarded immediately.

use std::sync::Arc;

use url::Url;

use crate::api::ApiVersion;
use crate::client::{ExecuteOptions, TsServerClient};
use crate::document::ContentChange;
use crate::protocol::{
    self, ChangeRequestArgs, CodeEdit, FileCodeEdits, FileRequestArgs, OpenRequestArgs,
    UpdateOpenRequestArgs, command,
};
use crate::resource_map::{MapConfig, PathNormalizer, ResourceMap};

#[derive(Debug)]
enum BufferOperation {
    Open(OpenRequestArgs),
    Close(String),
    Change(FileCodeEdits),
}

/// Forwards buffer lifecycle traffic to the back-end, batching when the
/// protocol version allows it.
pub(crate) struct BufferSynchronizer {
    client: Arc<dyn TsServerClient>,
    supports_batching: bool,
    pending: ResourceMap<BufferOperation>,
}

impl BufferSynchronizer {
    pub fn new(
        client: Arc<dyn TsServerClient>,
        normalizer: PathNormalizer,
        config: MapConfig,
    ) -> Self {
        let supports_batching = client.api_version().gte(ApiVersion::V3_4_0);
        Self {
            client,
            supports_batching,
            pending: ResourceMap::new(normalizer, config),
        }
    }

    pub fn open(&mut self, resource: &Url, args: OpenRequestArgs) {
        if self.supports_batching {
            self.update_pending(resource, BufferOperation::Open(args));
        } else if let Some(value) = protocol::args_value(command::OPEN, &args) {
            self.client.execute_without_waiting(command::OPEN, value);
        }
    }

    /// Returns whether the back-end observed (or will observe) the buffer
    /// as open. `false` means the open was still pending and both
    /// operations were elided.
    pub fn close(&mut self, resource: &Url, filepath: &str) -> bool {
        if self.supports_batching {
            self.update_pending(resource, BufferOperation::Close(filepath.to_string()))
        } else {
            let args = FileRequestArgs {
                file: filepath.to_string(),
            };
            if let Some(value) = protocol::args_value(command::CLOSE, &args) {
                self.client.execute_without_waiting(command::CLOSE, value);
            }
            true
        }
    }

    pub fn change(&mut self, resource: &Url, filepath: &str, changes: &[ContentChange]) {
        if changes.is_empty() {
            return;
        }
        if self.supports_batching {
            // End-of-document first, so earlier edits cannot shift the
            // positions of later ones when the back-end applies them in
            // order.
            let text_changes = changes
                .iter()
                .rev()
                .map(CodeEdit::from_content_change)
                .collect();
            self.update_pending(
                resource,
                BufferOperation::Change(FileCodeEdits {
                    file_name: filepath.to_string(),
                    text_changes,
                }),
            );
        } else {
            for change in changes {
                let args = ChangeRequestArgs::new(filepath, change);
                if let Some(value) = protocol::args_value(command::CHANGE, &args) {
                    self.client.execute_without_waiting(command::CHANGE, value);
                }
            }
        }
    }

    /// Commands other than `updateOpen` must observe a consistent buffer
    /// set, so everything pending is flushed first.
    pub fn before_command(&mut self, command_name: &str) {
        if command_name == command::UPDATE_OPEN {
            return;
        }
        self.flush();
    }

    /// Drop all pending operations without sending them.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let mut args = UpdateOpenRequestArgs::default();
        for (_, operation) in self.pending.drain() {
            match operation {
                BufferOperation::Open(open) => args.open_files.push(open),
                BufferOperation::Close(file) => args.closed_files.push(file),
                BufferOperation::Change(edits) => args.changed_files.push(edits),
            }
        }

        tracing::debug!(
            open = args.open_files.len(),
            closed = args.closed_files.len(),
            changed = args.changed_files.len(),
            "flushing buffer batch"
        );

        let Some(value) = protocol::args_value(command::UPDATE_OPEN, &args) else {
            return;
        };
        let request = self.client.execute(
            command::UPDATE_OPEN,
            value,
            None,
            ExecuteOptions {
                non_recoverable: true,
            },
        );
        tokio::spawn(async move {
            if let Err(error) = request.await {
                tracing::debug!(%error, "updateOpen batch failed");
            }
        });
    }

    /// Store the next operation for a resource, keeping at most one.
    ///
    /// Returns `false` only for a close that cancelled a still-pending
    /// open, in which case nothing is sent for the resource at all.
    fn update_pending(&mut self, resource: &Url, operation: BufferOperation) -> bool {
        if matches!(operation, BufferOperation::Close(_))
            && matches!(self.pending.get(resource), Some(BufferOperation::Open(_)))
        {
            // The back-end never learned about this buffer.
            self.pending.remove(resource);
            return false;
        }
        if self.pending.contains(resource) {
            // This file already has an operation queued; flush the whole
            // batch so the back-end observes transitions in causal order.
            self.flush();
        }
        self.pending.insert(resource, operation);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Position, Range};
    use crate::testing::FakeClient;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn open_args(file: &str) -> OpenRequestArgs {
        OpenRequestArgs {
            file: file.to_string(),
            file_content: String::new(),
            project_root_path: None,
            script_kind_name: None,
        }
    }

    fn change_at(line: u32, text: &str) -> ContentChange {
        ContentChange {
            range: Range {
                start: Position { line, character: 0 },
                end: Position { line, character: 1 },
            },
            text: text.to_string(),
        }
    }

    fn synchronizer(client: &Arc<FakeClient>) -> BufferSynchronizer {
        BufferSynchronizer::new(
            client.clone(),
            crate::resource_map::default_path_normalizer,
            MapConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_open_then_close_elides_both() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        let resource = url("file:///a.ts");
        sync.open(&resource, open_args("/a.ts"));
        assert!(!sync.close(&resource, "/a.ts"));

        sync.before_command("geterr");
        assert!(client.commands().is_empty());
    }

    #[tokio::test]
    async fn test_flush_partitions_batch() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        sync.open(&url("file:///a.ts"), open_args("/a.ts"));
        sync.close(&url("file:///b.ts"), "/b.ts");
        sync.change(&url("file:///c.ts"), "/c.ts", &[change_at(0, "x")]);

        sync.before_command("quickinfo");

        let commands = client.commands();
        assert_eq!(commands.len(), 1);
        let (command, args) = &commands[0];
        assert_eq!(command, "updateOpen");
        assert_eq!(args["openFiles"][0]["file"], "/a.ts");
        assert_eq!(args["closedFiles"][0], "/b.ts");
        assert_eq!(args["changedFiles"][0]["fileName"], "/c.ts");
    }

    #[tokio::test]
    async fn test_change_edits_are_reversed() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        let resource = url("file:///a.ts");
        sync.change(
            &resource,
            "/a.ts",
            &[change_at(0, "first"), change_at(4, "second")],
        );
        sync.before_command("quickinfo");

        let commands = client.commands();
        let edits = &commands[0].1["changedFiles"][0]["textChanges"];
        assert_eq!(edits[0]["start"]["line"], 5);
        assert_eq!(edits[1]["start"]["line"], 1);
    }

    #[tokio::test]
    async fn test_second_operation_for_same_file_flushes_first() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        let resource = url("file:///a.ts");
        sync.change(&resource, "/a.ts", &[change_at(0, "x")]);
        sync.change(&resource, "/a.ts", &[change_at(1, "y")]);

        // The first change was flushed to keep per-file ordering.
        let commands = client.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "updateOpen");

        sync.before_command("quickinfo");
        assert_eq!(client.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_close_after_flushed_open_is_sent() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        let resource = url("file:///a.ts");
        sync.open(&resource, open_args("/a.ts"));
        sync.before_command("quickinfo");

        // The back-end now knows about the buffer; close must be sent.
        assert!(sync.close(&resource, "/a.ts"));
        sync.before_command("quickinfo");

        let commands = client.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].1["closedFiles"][0], "/a.ts");
    }

    #[tokio::test]
    async fn test_before_update_open_does_not_flush() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        sync.open(&url("file:///a.ts"), open_args("/a.ts"));
        sync.before_command("updateOpen");
        assert!(client.commands().is_empty());
    }

    #[tokio::test]
    async fn test_empty_change_list_is_ignored() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        sync.change(&url("file:///a.ts"), "/a.ts", &[]);
        sync.before_command("quickinfo");
        assert!(client.commands().is_empty());
    }

    #[tokio::test]
    async fn test_reset_drops_pending_without_sending() {
        let client = FakeClient::new(ApiVersion::V3_4_0).arc();
        let mut sync = synchronizer(&client);

        sync.open(&url("file:///a.ts"), open_args("/a.ts"));
        sync.reset();
        sync.before_command("quickinfo");
        assert!(client.commands().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_mode_sends_immediately() {
        let client = FakeClient::new(ApiVersion::new(3, 0, 0)).arc();
        let mut sync = synchronizer(&client);

        let resource = url("file:///a.ts");
        sync.open(&resource, open_args("/a.ts"));
        sync.change(
            &resource,
            "/a.ts",
            &[change_at(0, "first"), change_at(4, "second")],
        );
        assert!(sync.close(&resource, "/a.ts"));

        let commands = client.commands();
        let names: Vec<&str> = commands.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["open", "change", "change", "close"]);
        // Legacy edits go out in editor order.
        assert_eq!(commands[1].1["line"], 1);
        assert_eq!(commands[2].1["line"], 5);
        assert_eq!(commands[3].1["file"], "/a.ts");
    }
}
