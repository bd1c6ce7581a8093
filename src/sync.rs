//! Orchestrates buffer synchronization and diagnostics scheduling.
//!
//! [`BufferSyncSupport`] reacts to editor events: it mirrors opened
//! documents into the back-end through the synchronizer, debounces
//! diagnostics for edited files, gates validation on tab visibility and
//! keeps at most one `geterr` request in flight.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use crate::buffer::{BufferKind, SyncedBuffer};
use crate::client::TsServerClient;
use crate::delayer::Delayer;
use crate::diagnostics::PendingDiagnostics;
use crate::document::{ContentChange, TextDocument};
use crate::get_err::GetErrRequest;
use crate::protocol::command;
use crate::resource_map::{MapConfig, ResourceMap, default_path_normalizer};
use crate::synchronizer::BufferSynchronizer;
use crate::tabs::{Tab, TabResourceTracker};

/// Base debounce of the diagnostics delayer.
const BASE_DIAGNOSTIC_DELAY: Duration = Duration::from_millis(300);
/// Delay used when re-triggering the drain without a specific file.
const DEFAULT_TRIGGER_DELAY: Duration = Duration::from_millis(200);
/// Per-file delay scaling: one millisecond per this many lines, clamped.
const LINES_PER_DELAY_MS: u64 = 20;
const MIN_FILE_DELAY_MS: u64 = 300;
const MAX_FILE_DELAY_MS: u64 = 800;

/// Validation switches, read from the embedder's configuration tree
/// (`javascript.validate.enable` / `typescript.validate.enable`).
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub validate_javascript: bool,
    #[serde(default = "default_true")]
    pub validate_typescript: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            validate_javascript: true,
            validate_typescript: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Events published to the diagnostics consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    /// The buffer for this resource was removed.
    Deleted(Url),
    /// A change for this resource is about to be forwarded.
    WillChange(Url),
}

struct State {
    synced_buffers: ResourceMap<SyncedBuffer>,
    pending_diagnostics: PendingDiagnostics,
    pending_get_err: Option<GetErrRequest>,
    synchronizer: BufferSynchronizer,
    tabs: TabResourceTracker,
    validate_javascript: bool,
    validate_typescript: bool,
}

struct Inner {
    client: Arc<dyn TsServerClient>,
    language_ids: HashSet<String>,
    delayer: Delayer,
    state: Mutex<State>,
    event_tx: mpsc::UnboundedSender<BufferEvent>,
    get_err_ids: AtomicU64,
}

/// Keeps the back-end's view of open files in sync with the editor and
/// drives the debounced diagnostics loop.
///
/// All entry points are synchronous and must be called from within a tokio
/// runtime; timers and request completions run in spawned tasks.
pub struct BufferSyncSupport {
    inner: Arc<Inner>,
}

impl BufferSyncSupport {
    /// Create the orchestrator together with its event stream.
    ///
    /// `language_ids` is the set of LSP language ids to track; documents in
    /// any other language are ignored. `initial_tabs` seeds the visibility
    /// tracker with the editor's current tab snapshot.
    pub fn new(
        client: Arc<dyn TsServerClient>,
        language_ids: impl IntoIterator<Item = String>,
        config: SyncConfig,
        map_config: MapConfig,
        initial_tabs: &[Tab],
    ) -> (Self, mpsc::UnboundedReceiver<BufferEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = State {
            synced_buffers: ResourceMap::new(default_path_normalizer, map_config),
            pending_diagnostics: PendingDiagnostics::new(default_path_normalizer, map_config),
            pending_get_err: None,
            synchronizer: BufferSynchronizer::new(
                client.clone(),
                default_path_normalizer,
                map_config,
            ),
            tabs: TabResourceTracker::new(default_path_normalizer, map_config, initial_tabs),
            validate_javascript: config.validate_javascript,
            validate_typescript: config.validate_typescript,
        };
        let support = Self {
            inner: Arc::new(Inner {
                client,
                language_ids: language_ids.into_iter().collect(),
                delayer: Delayer::new(BASE_DIAGNOSTIC_DELAY),
                state: Mutex::new(state),
                event_tx,
                get_err_ids: AtomicU64::new(0),
            }),
        };
        (support, event_rx)
    }

    /// Whether a buffer is tracked for this resource.
    #[must_use]
    pub fn handles(&self, resource: &Url) -> bool {
        self.inner.state.lock().synced_buffers.contains(resource)
    }

    #[must_use]
    pub fn has_pending_diagnostics(&self, resource: &Url) -> bool {
        self.inner.state.lock().pending_diagnostics.contains(resource)
    }

    /// Start tracking an opened document.
    ///
    /// Returns whether the document is (now or already) tracked. Documents
    /// in untracked languages or without a back-end file path are ignored.
    pub fn open_document(&self, document: Arc<dyn TextDocument>) -> bool {
        let inner = &self.inner;
        if !inner.language_ids.contains(document.language_id()) {
            return false;
        }
        let resource = document.uri().clone();

        let mut state = inner.state.lock();
        if state.synced_buffers.contains(&resource) {
            // Already tracked; a second open is a success, not a reopen.
            return true;
        }
        let Some(filepath) = inner.client.to_ts_file_path(&resource) else {
            return false;
        };

        let mut buffer = SyncedBuffer::new(document, filepath);
        buffer.open(inner.client.as_ref(), &mut state.synchronizer);
        state.synced_buffers.insert(&resource, buffer);
        Inner::request_diagnostic(inner, &mut state, &resource);
        true
    }

    /// Stop tracking a closed document.
    pub fn close_resource(&self, resource: &Url) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if !state.synced_buffers.contains(resource) {
            return;
        }

        state.pending_diagnostics.remove(resource);
        if let Some(request) = state.pending_get_err.as_mut() {
            request.remove_file(resource);
        }
        let Some(mut buffer) = state.synced_buffers.remove(resource) else {
            return;
        };
        let was_open = buffer.close(&mut state.synchronizer);
        let _ = inner
            .event_tx
            .send(BufferEvent::Deleted(buffer.resource().clone()));
        if was_open {
            // The closed buffer may have contributed project-level errors
            // to every other file; re-check them all.
            Inner::request_all_diagnostics(inner, &mut state);
        }
    }

    /// Forward a document change and schedule its diagnostics.
    pub fn document_changed(&self, resource: &Url, changes: &[ContentChange]) {
        let inner = &self.inner;
        let mut state = inner.state.lock();

        let canonical = {
            let State {
                synced_buffers,
                synchronizer,
                ..
            } = &mut *state;
            let Some(buffer) = synced_buffers.get_mut(resource) else {
                return;
            };
            let canonical = buffer.resource().clone();
            let _ = inner.event_tx.send(BufferEvent::WillChange(canonical.clone()));
            buffer.on_content_changed(changes, synchronizer);
            canonical
        };

        let triggered = Inner::request_diagnostic(inner, &mut state, &canonical);
        if !triggered && state.pending_get_err.is_some() {
            // The edited file is not eligible for its own cycle, but the
            // in-flight request would report stale results for it.
            if let Some(request) = state.pending_get_err.take() {
                request.cancel();
            }
            Inner::trigger_diagnostics(inner, DEFAULT_TRIGGER_DELAY);
        }
    }

    /// Schedule diagnostics for resources that became visible.
    pub fn get_err(&self, resources: &[Url]) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let now = Instant::now();
        let mut any_handled = false;
        for resource in resources {
            if state.synced_buffers.contains(resource) {
                state.pending_diagnostics.set(resource, now);
                any_handled = true;
            }
        }
        if any_handled {
            Inner::trigger_diagnostics(inner, DEFAULT_TRIGGER_DELAY);
        }
    }

    /// Apply one editor tab-change batch.
    pub fn tabs_changed(&self, opened: &[Tab], closed: &[Tab]) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let Some(delta) = state.tabs.handle_tab_changes(opened, closed) else {
            return;
        };
        if inner.client.enable_project_diagnostics() {
            // Visibility does not gate anything in project-wide mode.
            return;
        }

        for closed_resource in &delta.closed {
            if state.synced_buffers.contains(closed_resource) {
                state.pending_diagnostics.remove(closed_resource);
                if let Some(request) = state.pending_get_err.as_mut() {
                    request.remove_file(closed_resource);
                }
            }
        }
        for opened_resource in &delta.opened {
            Inner::request_diagnostic(inner, &mut state, opened_resource);
        }
    }

    /// Flush pending buffer operations before an unrelated command runs.
    pub fn before_command(&self, command: &str) {
        self.inner.state.lock().synchronizer.before_command(command);
    }

    /// Re-request diagnostics for every validatable buffer.
    pub fn request_all_diagnostics(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        Inner::request_all_diagnostics(inner, &mut state);
    }

    /// Run `f` without a `geterr` request in flight.
    ///
    /// Commands that edit documents (rename, quick fixes) call this so the
    /// back-end does not interleave stale diagnostics with the edit; the
    /// drain is re-triggered afterwards. In project-wide mode requests are
    /// too expensive to restart, so `f` runs alongside them.
    pub fn interrupt_get_err<R>(&self, f: impl FnOnce() -> R) -> R {
        let interrupted = {
            let mut state = self.inner.state.lock();
            if self.inner.client.enable_project_diagnostics() {
                None
            } else {
                state.pending_get_err.take()
            }
        };
        let Some(request) = interrupted else {
            return f();
        };
        request.cancel();
        let result = f();
        Inner::trigger_diagnostics(&self.inner, DEFAULT_TRIGGER_DELAY);
        result
    }

    /// Drop all scheduled work. Tracked buffers are kept.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        if let Some(request) = state.pending_get_err.take() {
            request.cancel();
        }
        state.pending_diagnostics.clear();
        state.synchronizer.reset();
    }

    /// Re-announce every tracked buffer after a back-end restart.
    pub fn reinitialize(&self) {
        self.reset();
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let State {
            synced_buffers,
            synchronizer,
            ..
        } = &mut *state;
        for buffer in synced_buffers.values_mut() {
            buffer.open(inner.client.as_ref(), synchronizer);
        }
    }

    /// Pick up changed validation settings.
    pub fn update_configuration(&self, config: &SyncConfig) {
        let mut state = self.inner.state.lock();
        state.validate_javascript = config.validate_javascript;
        state.validate_typescript = config.validate_typescript;
    }
}

impl Inner {
    /// Schedule diagnostics for one tracked buffer.
    ///
    /// Returns `false` when the buffer is not tracked or not eligible for
    /// validation. The delay grows with file size so huge files do not
    /// monopolize the back-end while the user types.
    fn request_diagnostic(inner: &Arc<Self>, state: &mut State, resource: &Url) -> bool {
        let State {
            synced_buffers,
            pending_diagnostics,
            tabs,
            validate_javascript,
            validate_typescript,
            ..
        } = state;
        let Some(buffer) = synced_buffers.get(resource) else {
            return false;
        };
        if !should_validate(
            inner.client.as_ref(),
            tabs,
            *validate_javascript,
            *validate_typescript,
            buffer,
        ) {
            return false;
        }

        let canonical = buffer.resource().clone();
        let line_count = u64::from(buffer.line_count());
        pending_diagnostics.set(&canonical, Instant::now());

        let delay_ms = line_count
            .div_ceil(LINES_PER_DELAY_MS)
            .clamp(MIN_FILE_DELAY_MS, MAX_FILE_DELAY_MS);
        Self::trigger_diagnostics(inner, Duration::from_millis(delay_ms));
        true
    }

    fn request_all_diagnostics(inner: &Arc<Self>, state: &mut State) {
        let State {
            synced_buffers,
            pending_diagnostics,
            tabs,
            validate_javascript,
            validate_typescript,
            ..
        } = state;
        let now = Instant::now();
        for buffer in synced_buffers.values() {
            if should_validate(
                inner.client.as_ref(),
                tabs,
                *validate_javascript,
                *validate_typescript,
                buffer,
            ) {
                pending_diagnostics.set(buffer.resource(), now);
            }
        }
        Self::trigger_diagnostics(inner, DEFAULT_TRIGGER_DELAY);
    }

    fn trigger_diagnostics(inner: &Arc<Self>, delay: Duration) {
        let weak = Arc::downgrade(inner);
        inner.delayer.trigger(delay, move || {
            if let Some(inner) = weak.upgrade() {
                Self::send_pending_diagnostics(&inner);
            }
        });
    }

    /// Drain the pending set into a new `geterr` request.
    fn send_pending_diagnostics(inner: &Arc<Self>) {
        let mut state = inner.state.lock();
        let mut ordered = state.pending_diagnostics.ordered_file_set();

        if let Some(request) = state.pending_get_err.take() {
            request.cancel();
            // Carry the interrupted request's files over so nobody loses
            // their re-check, as long as they are still tracked.
            for (resource, _) in request.files().entries() {
                if state.synced_buffers.contains(resource) {
                    ordered.insert(resource, ());
                }
            }
        }

        // Every open buffer might be visible in some editor column; include
        // them all behind the explicitly requested files.
        for buffer in state.synced_buffers.values() {
            ordered.insert(buffer.resource(), ());
        }

        if !ordered.is_empty() {
            // The back-end must see current buffer contents before it
            // computes errors.
            state.synchronizer.before_command(command::GETERR);
            let id = inner.get_err_ids.fetch_add(1, Ordering::Relaxed) + 1;
            let weak = Arc::downgrade(inner);
            let on_done = Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut state = inner.state.lock();
                    if state
                        .pending_get_err
                        .as_ref()
                        .is_some_and(|request| request.id() == id)
                    {
                        state.pending_get_err = None;
                    }
                }
            });
            tracing::debug!(files = ordered.len(), "requesting diagnostics");
            state.pending_get_err = Some(GetErrRequest::execute(&inner.client, id, ordered, on_done));
        }
        state.pending_diagnostics.clear();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.delayer.cancel();
        if let Some(request) = self.state.get_mut().pending_get_err.take() {
            request.cancel();
        }
    }
}

/// Visibility gating plus the per-language validation switches.
fn should_validate(
    client: &dyn TsServerClient,
    tabs: &TabResourceTracker,
    validate_javascript: bool,
    validate_typescript: bool,
    buffer: &SyncedBuffer,
) -> bool {
    if !client.enable_project_diagnostics() && !tabs.has(buffer.resource()) {
        // Only visible files are validated.
        return false;
    }
    match buffer.kind() {
        BufferKind::JavaScript => validate_javascript,
        BufferKind::TypeScript => validate_typescript,
    }
}
