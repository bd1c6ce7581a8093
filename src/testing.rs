//! Shared test doubles.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::ApiVersion;
use crate::client::{
    ClientCapabilities, ClientCapability, ExecuteOptions, RequestError, TsServerClient,
};
use crate::document::TextDocument;

/// Recording client: captures every issued command and lets tests resolve
/// `execute_async` requests on demand (or via cancellation).
pub(crate) struct FakeClient {
    pub api_version: ApiVersion,
    pub capabilities: Vec<ClientCapability>,
    pub project_diagnostics: bool,
    /// Resources for which `has_capability_for_resource(Semantic)` is false
    /// even when the client as a whole is semantic.
    pub semantic_denied: Vec<Url>,
    /// When false, `to_ts_file_path` resolves nothing (e.g. mid project
    /// reload).
    resolve_paths: Mutex<bool>,
    commands: Mutex<Vec<(String, serde_json::Value)>>,
    async_completions: Mutex<Vec<oneshot::Sender<Result<(), RequestError>>>>,
}

impl FakeClient {
    pub fn new(api_version: ApiVersion) -> Self {
        Self {
            api_version,
            capabilities: vec![ClientCapability::Syntax, ClientCapability::Semantic],
            project_diagnostics: false,
            semantic_denied: Vec::new(),
            resolve_paths: Mutex::new(true),
            commands: Mutex::new(Vec::new()),
            async_completions: Mutex::new(Vec::new()),
        }
    }

    pub fn set_resolve_paths(&self, resolve: bool) {
        *self.resolve_paths.lock() = resolve;
    }

    pub fn with_capabilities(mut self, capabilities: Vec<ClientCapability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_project_diagnostics(mut self) -> Self {
        self.project_diagnostics = true;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn commands(&self) -> Vec<(String, serde_json::Value)> {
        self.commands.lock().clone()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().clear();
    }

    /// Resolve the oldest still-pending `execute_async` request.
    pub fn complete_next_async(&self) {
        let mut completions = self.async_completions.lock();
        if !completions.is_empty() {
            let _ = completions.remove(0).send(Ok(()));
        }
    }

    pub fn pending_async_count(&self) -> usize {
        self.async_completions.lock().len()
    }
}

impl TsServerClient for FakeClient {
    fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities::new(self.capabilities.iter().copied())
    }

    fn has_capability_for_resource(&self, resource: &Url, capability: ClientCapability) -> bool {
        if capability == ClientCapability::Semantic && self.semantic_denied.contains(resource) {
            return false;
        }
        self.capabilities.contains(&capability)
    }

    fn enable_project_diagnostics(&self) -> bool {
        self.project_diagnostics
    }

    fn to_ts_file_path(&self, resource: &Url) -> Option<String> {
        (*self.resolve_paths.lock() && resource.scheme() == "file")
            .then(|| resource.path().to_string())
    }

    fn workspace_root_for_resource(&self, _: &Url) -> Option<String> {
        None
    }

    fn execute(
        &self,
        command: &'static str,
        args: serde_json::Value,
        _: Option<CancellationToken>,
        _: ExecuteOptions,
    ) -> BoxFuture<'static, Result<(), RequestError>> {
        self.commands.lock().push((command.to_string(), args));
        Box::pin(async { Ok(()) })
    }

    fn execute_without_waiting(&self, command: &'static str, args: serde_json::Value) {
        self.commands.lock().push((command.to_string(), args));
    }

    fn execute_async(
        &self,
        command: &'static str,
        args: serde_json::Value,
        token: CancellationToken,
    ) -> BoxFuture<'static, Result<(), RequestError>> {
        self.commands.lock().push((command.to_string(), args));
        let (tx, rx) = oneshot::channel();
        self.async_completions.lock().push(tx);
        Box::pin(async move {
            tokio::select! {
                () = token.cancelled() => Err(RequestError::Cancelled),
                result = rx => result.unwrap_or(Err(RequestError::TransportClosed)),
            }
        })
    }
}

/// Document whose content tests can swap out mid-flight.
pub(crate) struct FakeDocument {
    uri: Url,
    language_id: String,
    text: Mutex<String>,
}

impl FakeDocument {
    pub fn new(uri: &str, language_id: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            uri: Url::parse(uri).expect("valid test uri"),
            language_id: language_id.to_string(),
            text: Mutex::new(text.to_string()),
        })
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }
}

impl TextDocument for FakeDocument {
    fn uri(&self) -> &Url {
        &self.uri
    }

    fn language_id(&self) -> &str {
        &self.language_id
    }

    fn text(&self) -> String {
        self.text.lock().clone()
    }

    fn line_count(&self) -> u32 {
        self.text.lock().lines().count().max(1) as u32
    }
}
