//! Set of files awaiting diagnostics re-computation.

use std::time::Instant;

use url::Url;

use crate::resource_map::{MapConfig, PathNormalizer, ResourceMap};

/// Files whose diagnostics should be re-requested at the next drain,
/// stamped with the time of the most recent request.
///
/// Re-requesting a file overwrites its stamp; a later edit supersedes an
/// earlier one for the same file.
#[derive(Debug)]
pub(crate) struct PendingDiagnostics {
    map: ResourceMap<Instant>,
}

impl PendingDiagnostics {
    pub fn new(normalizer: PathNormalizer, config: MapConfig) -> Self {
        Self {
            map: ResourceMap::new(normalizer, config),
        }
    }

    pub fn set(&mut self, resource: &Url, timestamp: Instant) {
        self.map.insert(resource, timestamp);
    }

    pub fn contains(&self, resource: &Url) -> bool {
        self.map.contains(resource)
    }

    pub fn remove(&mut self, resource: &Url) {
        self.map.remove(resource);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// The pending files as a set, oldest request first.
    ///
    /// Ties keep their insertion order, so the drain serves the file that
    /// has waited longest.
    pub fn ordered_file_set(&self) -> ResourceMap<()> {
        let mut entries: Vec<(&Url, &Instant)> = self.map.entries().collect();
        entries.sort_by_key(|(_, timestamp)| **timestamp);

        let mut ordered = ResourceMap::new(self.map.normalizer(), self.map.config());
        for (resource, _) in entries {
            ordered.insert(resource, ());
        }
        ordered
    }
}
