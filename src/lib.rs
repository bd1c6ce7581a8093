//! Buffer synchronization core for a TypeScript server adapter.
//!
//! Sits between an LSP-speaking editor layer and a long-running TS analysis
//! server. Mirrors open documents into the back-end (batching per-file
//! operations into `updateOpen` requests), keeps visibility state in step
//! with editor tabs, and drives a debounced, cancellable diagnostics loop.
//!
//! The transports on both sides stay outside this crate: editor events
//! arrive through plain method calls on [`BufferSyncSupport`], and back-end
//! traffic leaves through the embedder-provided [`TsServerClient`].

pub mod api;
pub mod client;
pub mod delayer;
pub mod document;
pub mod protocol;
pub mod resource_map;
pub mod tabs;

pub(crate) mod buffer;
pub(crate) mod diagnostics;
pub(crate) mod get_err;
pub(crate) mod synchronizer;

mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ApiVersion;
pub use client::{
    ClientCapabilities, ClientCapability, ExecuteOptions, RequestError, TsServerClient,
};
pub use document::{ContentChange, Position, Range, TextDocument};
pub use resource_map::{MapConfig, PathNormalizer, ResourceMap, default_path_normalizer};
pub use sync::{BufferEvent, BufferSyncSupport, SyncConfig};
pub use tabs::{Tab, TabInput, TabResourceDelta, TabResourceTracker};
