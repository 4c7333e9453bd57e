//! Screen controller: owns the screen cache and the back stack, routes the
//! messages screens emit, and keeps the status line.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kubedeck_api::Repository;
use kubedeck_core::config::EngineConfig;
use kubedeck_core::{CrdDescriptor, FilterContext};
use kubedeck_engine::registry::{self, contexts_spec, Registry};
use kubedeck_engine::{Msg, Screen, ScreenTag, StatusLevel, Task};
use kubedeck_store::Ingest;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub text: String,
    pub at: Instant,
}

pub struct Controller {
    config: EngineConfig,
    shared: Arc<EngineConfig>,
    registry: Registry,
    repo: Arc<dyn Repository>,
    ingest: Option<mpsc::Sender<Ingest>>,
    screens: HashMap<String, Screen>,
    current: String,
    /// Screens to return to, each with the filter it was showing.
    history: Vec<(String, Option<FilterContext>)>,
    status: Option<StatusLine>,
    viewport: (u16, u16),
}

impl Controller {
    pub fn new(config: EngineConfig, repo: Arc<dyn Repository>, ingest: Option<mpsc::Sender<Ingest>>) -> Self {
        let registry = Registry::builtin(&config);
        Self {
            shared: Arc::new(config.clone()),
            config,
            registry,
            repo,
            ingest,
            screens: HashMap::new(),
            current: String::new(),
            history: Vec::new(),
            status: None,
            viewport: (0, 0),
        }
    }

    pub fn current_id(&self) -> &str { &self.current }
    pub fn current(&self) -> Option<&Screen> { self.screens.get(&self.current) }
    pub fn history(&self) -> impl Iterator<Item = &str> { self.history.iter().map(|(id, _)| id.as_str()) }
    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn context(&self) -> Option<&str> { self.config.current_context.as_deref() }

    /// The status line, unless it has expired. Loading messages stay until
    /// replaced.
    pub fn status(&self, now: Instant) -> Option<&StatusLine> {
        let st = self.status.as_ref()?;
        let ttl = self.config.status_ttl();
        if st.level != StatusLevel::Loading && now.saturating_duration_since(st.at) > ttl {
            return None;
        }
        Some(st)
    }

    /// Show the first screen; an unknown id falls back to pods.
    pub fn start(&mut self, screen_id: &str) -> Vec<Task> {
        let id = self.resolve(screen_id).unwrap_or_else(|| {
            warn!(screen = %screen_id, "controller: unknown start screen");
            registry::PODS.to_string()
        });
        self.show(&id, None)
    }

    /// Screen id for operator input: an exact id, else the first id it prefixes.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        if self.registry.contains(&name) {
            return Some(name);
        }
        self.registry.ids().find(|id| id.starts_with(&name)).map(|id| id.to_string())
    }

    /// Open a screen typed by the operator.
    pub fn open_by_name(&mut self, name: &str) -> Vec<Task> {
        match self.resolve(name) {
            Some(id) => self.open(&id, None),
            None => {
                self.set_status(StatusLevel::Error, format!("no screen named {:?}", name.trim()));
                Vec::new()
            }
        }
    }

    /// Switch to `screen_id`, remembering the current screen for [`Controller::back`].
    pub fn open(&mut self, screen_id: &str, filter: Option<FilterContext>) -> Vec<Task> {
        if !self.registry.contains(screen_id) {
            warn!(screen = %screen_id, "controller: switch to unknown screen");
            self.set_status(StatusLevel::Error, format!("unknown screen {}", screen_id));
            return Vec::new();
        }
        if !self.current.is_empty() && self.current != screen_id {
            let left = self.current().and_then(|s| s.filter_context().cloned());
            self.history.push((self.current.clone(), left));
        }
        self.show(screen_id, filter)
    }

    /// Return to the previous screen with the filter it had when it was left.
    /// The screen being left forgets its relationship filter.
    pub fn back(&mut self) -> Vec<Task> {
        let Some((prev, filter)) = self.history.pop() else {
            return Vec::new();
        };
        if let Some(screen) = self.screens.get_mut(&self.current) {
            screen.abandon();
        }
        debug!(from = %self.current, to = %prev, "controller: back");
        self.show(&prev, filter)
    }

    fn show(&mut self, screen_id: &str, filter: Option<FilterContext>) -> Vec<Task> {
        let Some(spec) = self.registry.get(screen_id) else {
            return Vec::new();
        };
        let repo = Arc::clone(&self.repo);
        let config = Arc::clone(&self.shared);
        let screen = self.screens.entry(screen_id.to_string()).or_insert_with(|| Screen::new(spec, repo, config));
        screen.set_filter_context(filter);
        let (width, height) = self.viewport;
        if width > 0 {
            screen.resize(width, height);
        }
        self.current = screen_id.to_string();
        info!(screen = %screen_id, depth = self.history.len(), "controller: show");
        screen.enter()
    }

    fn set_status(&mut self, level: StatusLevel, text: String) {
        self.status = Some(StatusLine { level, text, at: Instant::now() });
    }

    fn forward(&mut self, msg: Msg) -> Vec<Task> {
        match self.screens.get_mut(&self.current) {
            Some(screen) => screen.update(msg),
            None => Vec::new(),
        }
    }

    fn register_crd(&mut self, crd: CrdDescriptor) -> Vec<Task> {
        let spec = self.registry.insert_crd(&crd);
        self.screens.remove(&spec.id);
        if let Some(tx) = &self.ingest {
            if let Err(e) = tx.try_send(Ingest::RegisterCrd(crd)) {
                warn!(screen = %spec.id, error = %e, "controller: CRD registration not delivered");
            }
        }
        info!(screen = %spec.id, gvk = %spec.kind, "controller: dynamic screen registered");
        self.open(&spec.id, None)
    }

    fn switch_context(&mut self, name: String) -> Vec<Task> {
        info!(context = %name, "controller: context switch");
        if !self.config.contexts.contains(&name) {
            self.config.contexts.push(name.clone());
        }
        self.config.current_context = Some(name.clone());
        self.shared = Arc::new(self.config.clone());
        self.registry.insert(contexts_spec(&self.config));
        self.screens.remove(registry::CONTEXTS);
        self.set_status(StatusLevel::Info, format!("context {} selected", name));
        if self.current == registry::CONTEXTS {
            return self.show(registry::CONTEXTS, None);
        }
        Vec::new()
    }

    /// Route one message.
    pub fn update(&mut self, msg: Msg) -> Vec<Task> {
        match msg {
            Msg::ScreenSwitch { screen_id, filter } => self.open(&screen_id, filter),
            Msg::DynamicScreenCreate(crd) => self.register_crd(crd),
            Msg::ContextSwitch(name) => self.switch_context(name),
            Msg::OperationRequested { screen_id, op, key } => {
                info!(screen = %screen_id, op = %op, key = %key, "controller: operation requested");
                self.set_status(StatusLevel::Info, format!("{} {}: no executor attached", op, key));
                Vec::new()
            }
            Msg::Status { level, text, tag } => {
                if let Some(tag) = &tag {
                    if self.current().map(|s| s.tag()).as_ref() != Some(tag) {
                        trace!(screen = %tag.screen_id, current = %self.current, "controller: status for inactive visit dropped");
                        return Vec::new();
                    }
                }
                self.set_status(level, text.clone());
                self.forward(Msg::Status { level, text, tag })
            }
            Msg::RefreshComplete { .. } | Msg::Tick(_) => {
                let Some(tag) = tag_of(&msg) else {
                    return Vec::new();
                };
                if tag.screen_id != self.current {
                    trace!(screen = %tag.screen_id, current = %self.current, "controller: message for inactive screen dropped");
                    return Vec::new();
                }
                if matches!(msg, Msg::RefreshComplete { .. })
                    && self.status.as_ref().map(|s| s.level) == Some(StatusLevel::Loading)
                {
                    self.status = None;
                }
                self.forward(msg)
            }
            Msg::Resize { width, height } => {
                self.viewport = (width, height);
                self.forward(Msg::Resize { width, height })
            }
            Msg::Action(action) => self.forward(Msg::Action(action)),
        }
    }

    /// Last refresh duration of the current screen.
    pub fn last_refresh(&self) -> Option<Duration> { self.current().and_then(|s| s.last_refresh()) }
}

fn tag_of(msg: &Msg) -> Option<&ScreenTag> {
    match msg {
        Msg::RefreshComplete { tag, .. } | Msg::Tick(tag) => Some(tag),
        _ => None,
    }
}
