//! Tracks which resources are visible in editor tabs.
//!
//! Visibility gates diagnostics: when project-wide checking is off, only
//! files the user can actually see are validated. The editor layer feeds
//! this tracker its tab snapshot at startup and the open/close batches of
//! every tab-change event afterwards.

use std::collections::HashSet;

use url::Url;

use crate::resource_map::{MapConfig, PathNormalizer, ResourceMap};

/// One editor tab. The id is assigned by the editor layer and is only used
/// for set membership.
#[derive(Debug, Clone)]
pub struct Tab {
    pub id: u64,
    pub input: TabInput,
}

/// What a tab displays, reduced to the resources it makes visible.
#[derive(Debug, Clone)]
pub enum TabInput {
    Text { uri: Url },
    Diff { original: Url, modified: Url },
    Notebook { uri: Url },
    /// Terminals, webviews and other inputs without a document resource.
    Other,
}

impl TabInput {
    fn resources(&self) -> Vec<&Url> {
        match self {
            Self::Text { uri } | Self::Notebook { uri } => vec![uri],
            Self::Diff { original, modified } => vec![original, modified],
            Self::Other => Vec::new(),
        }
    }
}

/// Resources that became visible or stopped being visible in one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabResourceDelta {
    pub opened: Vec<Url>,
    pub closed: Vec<Url>,
}

/// Map from resource to the set of tabs currently displaying it.
///
/// A resource with no tabs is removed entirely, so `has` doubles as the
/// visibility check.
#[derive(Debug)]
pub struct TabResourceTracker {
    tabs: ResourceMap<HashSet<u64>>,
}

impl TabResourceTracker {
    #[must_use]
    pub fn new(normalizer: PathNormalizer, config: MapConfig, initial_tabs: &[Tab]) -> Self {
        let mut tracker = Self {
            tabs: ResourceMap::new(normalizer, config),
        };
        for tab in initial_tabs {
            tracker.add(tab);
        }
        tracker
    }

    /// Whether any tab currently displays `resource`.
    #[must_use]
    pub fn has(&self, resource: &Url) -> bool {
        self.tabs.get(resource).is_some_and(|tabs| !tabs.is_empty())
    }

    /// Apply one tab-change batch.
    ///
    /// Returns the visibility delta, or `None` when no resource changed
    /// visibility (e.g. a second tab opened onto an already-visible file).
    pub fn handle_tab_changes(&mut self, opened: &[Tab], closed: &[Tab]) -> Option<TabResourceDelta> {
        let closed_resources: Vec<Url> = closed.iter().flat_map(|tab| self.delete(tab)).collect();
        let opened_resources: Vec<Url> = opened.iter().flat_map(|tab| self.add(tab)).collect();
        if closed_resources.is_empty() && opened_resources.is_empty() {
            return None;
        }
        Some(TabResourceDelta {
            opened: opened_resources,
            closed: closed_resources,
        })
    }

    /// Returns the resources this tab made visible for the first time.
    fn add(&mut self, tab: &Tab) -> Vec<Url> {
        let mut newly_opened = Vec::new();
        for resource in tab.input.resources() {
            match self.tabs.get_mut(resource) {
                Some(tabs) => {
                    tabs.insert(tab.id);
                }
                None => {
                    self.tabs.insert(resource, HashSet::from([tab.id]));
                    newly_opened.push(resource.clone());
                }
            }
        }
        newly_opened
    }

    /// Returns the resources that lost their last tab.
    fn delete(&mut self, tab: &Tab) -> Vec<Url> {
        let mut newly_closed = Vec::new();
        for resource in tab.input.resources() {
            let emptied = match self.tabs.get_mut(resource) {
                Some(tabs) => {
                    tabs.remove(&tab.id);
                    tabs.is_empty()
                }
                None => false,
            };
            if emptied {
                self.tabs.remove(resource);
                newly_closed.push(resource.clone());
            }
        }
        newly_closed
    }
}
