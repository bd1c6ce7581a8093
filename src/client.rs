//! Seam to the TS server transport.
//!
//! The transport (request queue, process management, wire protocol) lives
//! outside this crate. Everything here talks to it through
//! [`TsServerClient`], which the embedder implements; tests substitute a
//! recording fake.

use std::collections::HashSet;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::ApiVersion;

/// A capability the connected back-end may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCapability {
    /// Syntax-only operations, available even without a loaded project.
    Syntax,
    /// Full semantic analysis.
    Semantic,
}

/// Set of capabilities the client currently holds.
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    set: HashSet<ClientCapability>,
}

impl ClientCapabilities {
    #[must_use]
    pub fn new(capabilities: impl IntoIterator<Item = ClientCapability>) -> Self {
        Self {
            set: capabilities.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn has(&self, capability: ClientCapability) -> bool {
        self.set.contains(&capability)
    }
}

/// Outcome of a back-end request that did not complete normally.
///
/// Transport failures never corrupt local state; the affected file is
/// picked up again by the next diagnostics cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("request was cancelled")]
    Cancelled,
    #[error("TS server rejected the request: {0}")]
    Rejected(String),
    #[error("transport to the TS server is closed")]
    TransportClosed,
}

/// Options for [`TsServerClient::execute`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// A failed non-recoverable request poisons the server instance; the
    /// transport restarts it rather than retrying the command.
    pub non_recoverable: bool,
}

/// Interface to the TS server owned by the embedder.
///
/// The async methods return boxed futures so the trait stays object-safe;
/// callers that do not need the response drive the future in a spawned
/// task.
pub trait TsServerClient: Send + Sync {
    fn api_version(&self) -> ApiVersion;

    fn capabilities(&self) -> ClientCapabilities;

    /// Capability check for one specific resource. In-memory and
    /// single-file resources may only have syntax support even when the
    /// client as a whole is semantic.
    fn has_capability_for_resource(&self, resource: &Url, capability: ClientCapability) -> bool;

    /// Whether the embedder configuration enables project-wide diagnostics.
    fn enable_project_diagnostics(&self) -> bool;

    /// Back-end file id for a resource, or `None` when the back-end cannot
    /// address it (e.g. an unsupported scheme).
    fn to_ts_file_path(&self, resource: &Url) -> Option<String>;

    fn workspace_root_for_resource(&self, resource: &Url) -> Option<String>;

    /// Send a request and await its response.
    fn execute(
        &self,
        command: &'static str,
        args: serde_json::Value,
        token: Option<CancellationToken>,
        options: ExecuteOptions,
    ) -> BoxFuture<'static, Result<(), RequestError>>;

    /// Send a request without waiting for (or expecting) a response.
    fn execute_without_waiting(&self, command: &'static str, args: serde_json::Value);

    /// Send a long-running request.
    ///
    /// Implementations must resolve the returned future when `token` fires,
    /// with `Err(RequestError::Cancelled)`; completion callbacks hang off
    /// that resolution.
    fn execute_async(
        &self,
        command: &'static str,
        args: serde_json::Value,
        token: CancellationToken,
    ) -> BoxFuture<'static, Result<(), RequestError>>;
}
