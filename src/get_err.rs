//! One in-flight diagnostics request against the back-end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::ApiVersion;
use crate::client::{ClientCapability, TsServerClient};
use crate::protocol::{self, GeterrForProjectRequestArgs, GeterrRequestArgs, command};
use crate::resource_map::ResourceMap;

/// Completion callback, invoked exactly once per request.
pub(crate) type OnDone = Box<dyn FnOnce() + Send>;

/// A cancellable `geterr` request for a set of files.
///
/// The request is issued at construction. Whatever ends it first —
/// response, transport failure or [`cancel`](Self::cancel) — flips the
/// `done` flag and runs the completion callback; the flag guarantees the
/// callback fires once even when cancellation races natural completion.
pub(crate) struct GetErrRequest {
    id: u64,
    files: ResourceMap<()>,
    done: Arc<AtomicBool>,
    token: CancellationToken,
}

impl GetErrRequest {
    /// Issue a diagnostics request for `files`.
    ///
    /// Files are filtered to those the back-end can check at all: from
    /// protocol 4.4 syntax-only checking is always available, on older
    /// versions a file must have semantic support. When project-wide
    /// diagnostics are enabled only the first file is sent — the back-end
    /// fans out to the rest of the project on its own.
    ///
    /// When nothing remains to request, the callback still runs, on the
    /// next turn of the scheduler so the caller can store the returned
    /// handle first.
    pub fn execute(
        client: &Arc<dyn TsServerClient>,
        id: u64,
        files: ResourceMap<()>,
        on_done: OnDone,
    ) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        let file_paths: Vec<String> = if error_reporting_enabled(client.as_ref()) {
            let supports_syntax_get_err = client.api_version().gte(ApiVersion::V4_4_0);
            files
                .entries()
                .filter(|(resource, _)| {
                    supports_syntax_get_err
                        || client.has_capability_for_resource(resource, ClientCapability::Semantic)
                })
                .filter_map(|(resource, _)| client.to_ts_file_path(resource))
                .collect()
        } else {
            Vec::new()
        };

        let request_future = if file_paths.is_empty() {
            None
        } else if project_diagnostics_enabled(client.as_ref()) {
            let args = GeterrForProjectRequestArgs {
                delay: 0,
                file: file_paths[0].clone(),
            };
            protocol::args_value(command::GETERR_FOR_PROJECT, &args).map(|value| {
                client.execute_async(command::GETERR_FOR_PROJECT, value, token.clone())
            })
        } else {
            let args = GeterrRequestArgs {
                delay: 0,
                files: file_paths,
            };
            protocol::args_value(command::GETERR, &args)
                .map(|value| client.execute_async(command::GETERR, value, token.clone()))
        };

        match request_future {
            Some(future) => {
                let done = done.clone();
                tokio::spawn(async move {
                    let _ = future.await;
                    if !done.swap(true, Ordering::SeqCst) {
                        on_done();
                    }
                });
            }
            None => {
                done.store(true, Ordering::SeqCst);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    on_done();
                });
            }
        }

        Self {
            id,
            files,
            done,
            token,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The resources this request covers. The orchestrator prunes closed
    /// buffers out of the set and folds the rest into the next drain.
    pub fn files(&self) -> &ResourceMap<()> {
        &self.files
    }

    pub fn remove_file(&mut self, resource: &Url) {
        self.files.remove(resource);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Signal cancellation. Idempotent; completion still flows through the
    /// request future's resolution.
    pub fn cancel(&self) {
        if !self.done.load(Ordering::SeqCst) {
            self.token.cancel();
        }
    }
}

fn error_reporting_enabled(client: &dyn TsServerClient) -> bool {
    client.api_version().gte(ApiVersion::V4_4_0)
        || client.capabilities().has(ClientCapability::Semantic)
}

fn project_diagnostics_enabled(client: &dyn TsServerClient) -> bool {
    client.enable_project_diagnostics() && client.capabilities().has(ClientCapability::Semantic)
}
