//! Declarative screen configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kubedeck_api::{RepoResult, Repository};
use kubedeck_core::columns::ColumnSpec;
use kubedeck_core::{FilterContext, Item, ResourceKind};
use kubedeck_search::FilterEngine;

use crate::nav::NavigationHandler;
use crate::refresh;

/// An externally executed action on the selected row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: String,
    pub name: String,
    pub shortcut: char,
}

impl Operation {
    pub fn new(id: &str, name: &str, shortcut: char) -> Self {
        Self { id: id.to_string(), name: name.to_string(), shortcut }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub enabled: bool,
    /// Falls back to the engine-wide interval when unset.
    pub interval: Option<Duration>,
}

impl Default for RefreshPolicy {
    fn default() -> Self { Self { enabled: true, interval: None } }
}

impl RefreshPolicy {
    pub fn disabled() -> Self { Self { enabled: false, interval: None } }
    pub fn every(interval: Duration) -> Self { Self { enabled: true, interval: Some(interval) } }
}

/// Per-screen strategy layered over the shared refresh and filter behaviour.
#[async_trait::async_trait]
pub trait Behavior: Send + Sync {
    /// Whether refresh should engage and check the repository before fetching.
    fn uses_repository(&self) -> bool { true }

    async fn fetch(&self, repo: &dyn Repository, kind: &ResourceKind, ctx: Option<&FilterContext>) -> RepoResult<Vec<Item>> {
        refresh::fetch(repo, kind, ctx).await
    }

    fn filter(&self, engine: &FilterEngine, items: &[Item], fields: &[String], text: &str) -> Vec<Item> {
        engine.filter(items, fields, text)
    }
}

/// Repository-backed fetch and fuzzy filter.
pub struct DefaultBehavior;

impl Behavior for DefaultBehavior {}

/// A named, typed screen: what to fetch, how to show it, where Enter goes.
#[derive(Clone)]
pub struct ScreenSpec {
    pub id: String,
    pub title: String,
    pub kind: ResourceKind,
    pub columns: Vec<ColumnSpec>,
    pub search_fields: Vec<String>,
    pub operations: Vec<Operation>,
    pub refresh: RefreshPolicy,
    pub track_selection: bool,
    pub navigation: Option<Arc<dyn NavigationHandler>>,
    pub behavior: Arc<dyn Behavior>,
}

impl fmt::Debug for ScreenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenSpec")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("columns", &self.columns.len())
            .field("navigation", &self.navigation.is_some())
            .finish()
    }
}

impl ScreenSpec {
    pub fn new(id: &str, title: &str, kind: ResourceKind, columns: Vec<ColumnSpec>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            kind,
            columns,
            search_fields: vec!["Namespace".to_string(), "Name".to_string()],
            operations: Vec::new(),
            refresh: RefreshPolicy::default(),
            track_selection: true,
            navigation: None,
            behavior: Arc::new(DefaultBehavior),
        }
    }

    pub fn search(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn operation(mut self, op: Operation) -> Self { self.operations.push(op); self }
    pub fn refresh(mut self, policy: RefreshPolicy) -> Self { self.refresh = policy; self }
    pub fn track_selection(mut self, on: bool) -> Self { self.track_selection = on; self }
    pub fn navigate(mut self, handler: impl NavigationHandler + 'static) -> Self { self.navigation = Some(Arc::new(handler)); self }
    pub fn behavior(mut self, behavior: impl Behavior + 'static) -> Self { self.behavior = Arc::new(behavior); self }

    pub fn operation_for(&self, key: char) -> Option<&Operation> {
        self.operations.iter().find(|o| o.shortcut == key)
    }
}
