//! Screen instance: one configured resource view and its lifecycle.
//!
//! Entering a screen starts a new visit (a fresh [`ScreenTag`]) and emits a
//! refresh, preceded by a loading status when the source is still syncing.
//! The periodic tick chain starts on the first refresh result or status the
//! visit observes; each tick emits one refresh and the next tick. Ticks and
//! results from another visit are dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use kubedeck_api::Repository;
use kubedeck_core::config::EngineConfig;
use kubedeck_core::{stable_key, FilterContext, Item};
use kubedeck_search::FilterEngine;
use tracing::{debug, info, trace};

use crate::layout::{compute_layout, Layout};
use crate::refresh::RefreshJob;
use crate::spec::ScreenSpec;
use crate::table::{ColumnHeader, TableModel, TableView};
use crate::{ready, Action, Msg, ScreenTag, Task};

pub struct Screen<T: TableView = TableModel> {
    spec: Arc<ScreenSpec>,
    repo: Arc<dyn Repository>,
    config: Arc<EngineConfig>,
    filters: FilterEngine,
    table: T,
    items: Vec<Item>,
    filtered: Vec<Item>,
    filter_text: String,
    selected_key: Option<String>,
    layout: Layout,
    filter_context: Option<FilterContext>,
    initialized: bool,
    epoch: u64,
    last_refresh: Option<Duration>,
}

impl Screen<TableModel> {
    pub fn new(spec: Arc<ScreenSpec>, repo: Arc<dyn Repository>, config: Arc<EngineConfig>) -> Self {
        Self::with_table(spec, repo, config, TableModel::new())
    }
}

impl<T: TableView> Screen<T> {
    pub fn with_table(spec: Arc<ScreenSpec>, repo: Arc<dyn Repository>, config: Arc<EngineConfig>, table: T) -> Self {
        let mut screen = Self {
            spec,
            repo,
            config,
            filters: FilterEngine::new(),
            table,
            items: Vec::new(),
            filtered: Vec::new(),
            filter_text: String::new(),
            selected_key: None,
            layout: Layout::default(),
            filter_context: None,
            initialized: false,
            epoch: 0,
            last_refresh: None,
        };
        screen.relayout(0);
        screen
    }

    pub fn id(&self) -> &str { &self.spec.id }
    pub fn spec(&self) -> &ScreenSpec { &self.spec }
    pub fn table(&self) -> &T { &self.table }
    pub fn items(&self) -> &[Item] { &self.items }
    pub fn filtered(&self) -> &[Item] { &self.filtered }
    pub fn filter_text(&self) -> &str { &self.filter_text }
    pub fn filter_context(&self) -> Option<&FilterContext> { self.filter_context.as_ref() }
    pub fn selected_key(&self) -> Option<&str> { self.selected_key.as_deref() }
    pub fn layout(&self) -> &Layout { &self.layout }
    pub fn hidden_count(&self) -> usize { self.layout.hidden }
    pub fn is_initialized(&self) -> bool { self.initialized }
    pub fn last_refresh(&self) -> Option<Duration> { self.last_refresh }
    pub fn cursor(&self) -> usize { self.table.cursor() }

    pub fn tag(&self) -> ScreenTag { ScreenTag { screen_id: self.spec.id.clone(), epoch: self.epoch } }

    /// Header line: title, relationship filter and row counts.
    pub fn title(&self) -> String {
        let mut out = self.spec.title.clone();
        if let Some(ctx) = &self.filter_context {
            out.push_str(&format!(" ({})", ctx));
        }
        out.push_str(&format!(" [{}/{}]", self.filtered.len(), self.items.len()));
        out
    }

    pub fn selected(&self) -> Option<&Item> { self.filtered.get(self.table.cursor()) }

    /// Attach or clear the relationship filter used by the next refresh.
    pub fn set_filter_context(&mut self, ctx: Option<FilterContext>) { self.filter_context = ctx; }

    /// Drop per-visit state when the operator leaves this screen for good.
    pub fn abandon(&mut self) {
        debug!(screen = %self.spec.id, "screen: abandoned");
        self.filter_context = None;
        self.initialized = false;
    }

    /// Start a new visit.
    pub fn enter(&mut self) -> Vec<Task> {
        self.epoch += 1;
        self.initialized = false;
        info!(screen = %self.spec.id, epoch = self.epoch, filter = ?self.filter_context, "screen: enter");
        let mut tasks = Vec::with_capacity(2);
        if self.spec.behavior.uses_repository() && !self.repo.is_ready(&self.spec.kind) {
            tasks.push(ready(Msg::loading(format!("loading {}...", self.spec.title)).for_visit(self.tag())));
        }
        tasks.push(self.refresh());
        tasks
    }

    /// One refresh of this visit.
    pub fn refresh(&self) -> Task {
        let job = RefreshJob {
            repo: Arc::clone(&self.repo),
            behavior: Arc::clone(&self.spec.behavior),
            kind: self.spec.kind.clone(),
            title: self.spec.title.clone(),
            filter: self.filter_context.clone(),
            tag: self.tag(),
        };
        job.run().boxed()
    }

    fn interval(&self) -> Duration {
        self.spec.refresh.interval.unwrap_or_else(|| self.config.refresh_interval())
    }

    fn tick(&self) -> Task {
        let tag = self.tag();
        let interval = self.interval();
        async move {
            tokio::time::sleep(interval).await;
            Msg::Tick(tag)
        }
        .boxed()
    }

    fn start_ticking(&mut self) -> Vec<Task> {
        if self.initialized || !self.spec.refresh.enabled {
            return Vec::new();
        }
        self.initialized = true;
        debug!(screen = %self.spec.id, epoch = self.epoch, "screen: first tick scheduled");
        vec![self.tick()]
    }

    /// Process one event.
    pub fn update(&mut self, msg: Msg) -> Vec<Task> {
        match msg {
            Msg::Tick(tag) => {
                if tag != self.tag() {
                    trace!(screen = %self.spec.id, stale = ?tag, "screen: foreign tick dropped");
                    return Vec::new();
                }
                if !self.spec.refresh.enabled {
                    return Vec::new();
                }
                vec![self.refresh(), self.tick()]
            }
            Msg::RefreshComplete { tag, items, duration } => {
                if tag != self.tag() {
                    trace!(screen = %self.spec.id, stale = ?tag, "screen: foreign refresh dropped");
                    return Vec::new();
                }
                self.last_refresh = Some(duration);
                self.apply_items(items);
                self.start_ticking()
            }
            Msg::Status { tag: Some(tag), .. } if tag != self.tag() => {
                trace!(screen = %self.spec.id, stale = ?tag, "screen: foreign status dropped");
                Vec::new()
            }
            Msg::Status { .. } => self.start_ticking(),
            Msg::Action(action) => self.handle_action(action),
            Msg::Resize { width, height } => {
                self.resize(width, height);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    pub fn handle_action(&mut self, action: Action) -> Vec<Task> {
        let cur = self.table.cursor();
        let page = self.config.page_size.max(1);
        match action {
            Action::Up => self.move_cursor(cur.saturating_sub(1)),
            Action::Down => self.move_cursor(cur + 1),
            Action::PageUp => self.move_cursor(cur.saturating_sub(page)),
            Action::PageDown => self.move_cursor(cur + page),
            Action::Top => self.move_cursor(0),
            Action::Bottom => self.move_cursor(self.filtered.len().saturating_sub(1)),
            Action::Enter => return self.navigate().into_iter().collect(),
            Action::Refresh => return vec![self.refresh()],
            Action::SetFilter(text) => self.set_filter(&text),
            Action::Shortcut(key) => return self.operation(key).into_iter().collect(),
        }
        Vec::new()
    }

    /// Route Enter on the selected row through the navigation handler.
    pub fn navigate(&self) -> Option<Task> {
        let handler = self.spec.navigation.as_ref()?;
        let selected = self.selected()?;
        handler.navigate(selected.as_ref())
    }

    fn operation(&self, key: char) -> Option<Task> {
        let op = self.spec.operation_for(key)?;
        let selected = self.selected()?;
        Some(ready(Msg::OperationRequested {
            screen_id: self.spec.id.clone(),
            op: op.id.clone(),
            key: stable_key(selected.as_ref()),
        }))
    }

    /// Replace the filter text; the cursor returns to the first row.
    pub fn set_filter(&mut self, text: &str) {
        self.filter_text = text.to_string();
        self.recompute_filtered();
        self.sync_rows();
        self.move_cursor(0);
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.table.set_height(height);
        self.relayout(width);
        self.sync_rows();
    }

    fn relayout(&mut self, width: u16) {
        self.layout = compute_layout(
            &self.spec.columns,
            width,
            self.config.column_padding,
            self.config.default_column_width,
        );
        let headers = self
            .layout
            .visible
            .iter()
            .zip(self.layout.widths.iter())
            .map(|(&i, &w)| ColumnHeader { title: self.spec.columns[i].title.clone(), width: w })
            .collect();
        self.table.set_width(width);
        self.table.set_columns(headers);
    }

    fn apply_items(&mut self, items: Vec<Item>) {
        self.items = items;
        self.recompute_filtered();
        self.sync_rows();
        if !self.spec.track_selection || !self.filter_text.is_empty() {
            let cur = self.table.cursor();
            self.move_cursor(cur);
            return;
        }
        let found = self
            .selected_key
            .as_deref()
            .and_then(|key| self.filtered.iter().position(|it| stable_key(it.as_ref()) == key));
        match found {
            Some(idx) => self.move_cursor(idx),
            None => self.move_cursor(self.filtered.len().saturating_sub(1).min(self.table.cursor())),
        }
    }

    fn recompute_filtered(&mut self) {
        self.filtered = self.spec.behavior.filter(&self.filters, &self.items, &self.spec.search_fields, &self.filter_text);
    }

    fn sync_rows(&mut self) {
        let rows = self
            .filtered
            .iter()
            .map(|it| self.layout.visible.iter().map(|&i| self.spec.columns[i].render(it.as_ref())).collect())
            .collect();
        self.table.set_rows(rows);
    }

    fn move_cursor(&mut self, idx: usize) {
        self.table.set_cursor(idx.min(self.filtered.len().saturating_sub(1)));
        self.selected_key = self.selected().map(|it| stable_key(it.as_ref()));
    }
}
