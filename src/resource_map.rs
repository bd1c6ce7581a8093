//! Case-aware keying from resource URIs to values.
//!
//! Buffers, pending diagnostics and tab state are all keyed by the URI of
//! the document they describe. On case-insensitive file systems two URIs
//! that differ only by case name the same file, so lookups fold case on the
//! normalized key while iteration still yields the URI the entry was first
//! inserted under.

use indexmap::IndexMap;
use url::Url;

/// Produces the canonical string key for a resource, or `None` when the
/// resource cannot be addressed by the back-end at all.
pub type PathNormalizer = fn(&Url) -> Option<String>;

/// Case-folding policy captured at map construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapConfig {
    /// Treat absolute POSIX paths as case-insensitive. Windows-style drive
    /// paths are always folded.
    pub on_case_insensitive_file_system: bool,
}

/// Default key rule: `file:` URIs map to their decoded filesystem path,
/// anything else to its serialized form without the fragment.
pub fn default_path_normalizer(resource: &Url) -> Option<String> {
    if resource.scheme() == "file" {
        let path = resource.to_file_path().ok()?;
        let mut path = path.to_string_lossy().into_owned();
        // Decoding a drive-letter URI on a POSIX host keeps a leading
        // slash ("/C:/a.ts"); strip it so the key matches the Windows form.
        if path.len() >= 3 && path.starts_with('/') && is_windows_path(&path[1..]) {
            path.remove(0);
        }
        Some(path)
    } else {
        let mut stripped = resource.clone();
        stripped.set_fragment(None);
        Some(stripped.to_string())
    }
}

fn is_windows_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

#[derive(Debug)]
struct MapEntry<V> {
    resource: Url,
    value: V,
}

/// Map from resource URI to `V`.
///
/// Lookups go through the normalized (and possibly case-folded) key;
/// iteration is in insertion order and yields the original URI of the first
/// insert for each key, regardless of the case later lookups used.
#[derive(Debug)]
pub struct ResourceMap<V> {
    normalizer: PathNormalizer,
    config: MapConfig,
    entries: IndexMap<String, MapEntry<V>>,
}

impl<V> ResourceMap<V> {
    #[must_use]
    pub fn new(normalizer: PathNormalizer, config: MapConfig) -> Self {
        Self {
            normalizer,
            config,
            entries: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, resource: &Url) -> bool {
        match self.key_for(resource) {
            Some(key) => self.entries.contains_key(&key),
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, resource: &Url) -> Option<&V> {
        let key = self.key_for(resource)?;
        self.entries.get(&key).map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, resource: &Url) -> Option<&mut V> {
        let key = self.key_for(resource)?;
        self.entries.get_mut(&key).map(|entry| &mut entry.value)
    }

    /// Insert or replace the value for `resource`.
    ///
    /// Replacing keeps the URI of the original insert so that iteration is
    /// stable under case-folded lookups. Resources the normalizer rejects
    /// are silently ignored.
    pub fn insert(&mut self, resource: &Url, value: V) {
        let Some(key) = self.key_for(resource) else {
            return;
        };
        match self.entries.entry(key) {
            indexmap::map::Entry::Occupied(mut occupied) => {
                occupied.get_mut().value = value;
            }
            indexmap::map::Entry::Vacant(vacant) => {
                vacant.insert(MapEntry {
                    resource: resource.clone(),
                    value,
                });
            }
        }
    }

    /// Remove the entry for `resource`, preserving the order of the rest.
    pub fn remove(&mut self, resource: &Url) -> Option<V> {
        let key = self.key_for(resource)?;
        self.entries.shift_remove(&key).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|entry| &entry.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut().map(|entry| &mut entry.value)
    }

    /// Iterate `(original URI, value)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Url, &V)> {
        self.entries
            .values()
            .map(|entry| (&entry.resource, &entry.value))
    }

    /// Drain all entries in insertion order.
    pub fn drain(&mut self) -> impl Iterator<Item = (Url, V)> + '_ {
        self.entries
            .drain(..)
            .map(|(_, entry)| (entry.resource, entry.value))
    }

    #[must_use]
    pub fn normalizer(&self) -> PathNormalizer {
        self.normalizer
    }

    #[must_use]
    pub fn config(&self) -> MapConfig {
        self.config
    }

    fn key_for(&self, resource: &Url) -> Option<String> {
        let path = (self.normalizer)(resource)?;
        if self.is_case_insensitive_path(&path) {
            Some(path.to_lowercase())
        } else {
            Some(path)
        }
    }

    fn is_case_insensitive_path(&self, path: &str) -> bool {
        if is_windows_path(path) {
            return true;
        }
        path.starts_with('/') && self.config.on_case_insensitive_file_system
    }
}
