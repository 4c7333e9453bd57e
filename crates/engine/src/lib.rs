//! kubedeck screen engine.
//!
//! A [`Screen`] turns a declarative [`ScreenSpec`] into a table with fuzzy
//! filtering, responsive columns, contextual navigation and a self-rescheduling
//! refresh loop. The engine never runs side effects itself: it returns
//! [`Task`]s whose single output [`Msg`] the runtime feeds back in.

#![forbid(unsafe_code)]

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use kubedeck_core::{CrdDescriptor, FilterContext, Item};

pub mod layout;
pub mod nav;
pub mod refresh;
pub mod registry;
pub mod screen;
pub mod spec;
pub mod table;

pub use layout::{compute_layout, Layout};
pub use nav::NavigationHandler;
pub use registry::Registry;
pub use screen::Screen;
pub use spec::{Behavior, DefaultBehavior, Operation, RefreshPolicy, ScreenSpec};
pub use table::{ColumnHeader, TableModel, TableView};

/// Deferred side effect; resolves to exactly one message.
pub type Task = BoxFuture<'static, Msg>;

/// Identity of one visit to one screen. Ticks and refresh results carry the
/// tag of the visit that scheduled them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenTag {
    pub screen_id: String,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Loading,
    Info,
    Error,
}

/// Operator input, already decoded from key presses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Enter,
    Refresh,
    SetFilter(String),
    /// Operation shortcut key.
    Shortcut(char),
}

/// Everything that flows into or out of a screen.
#[derive(Debug, Clone)]
pub enum Msg {
    ScreenSwitch { screen_id: String, filter: Option<FilterContext> },
    DynamicScreenCreate(CrdDescriptor),
    ContextSwitch(String),
    /// `tag` is set when a refresh of one visit produced the status.
    Status { level: StatusLevel, text: String, tag: Option<ScreenTag> },
    RefreshComplete { tag: ScreenTag, items: Vec<Item>, duration: Duration },
    Tick(ScreenTag),
    OperationRequested { screen_id: String, op: String, key: String },
    Action(Action),
    Resize { width: u16, height: u16 },
}

impl Msg {
    pub fn loading(text: impl Into<String>) -> Self { Msg::Status { level: StatusLevel::Loading, text: text.into(), tag: None } }
    pub fn info(text: impl Into<String>) -> Self { Msg::Status { level: StatusLevel::Info, text: text.into(), tag: None } }
    pub fn error(text: impl Into<String>) -> Self { Msg::Status { level: StatusLevel::Error, text: text.into(), tag: None } }

    /// Bind a status to the visit that produced it.
    pub fn for_visit(self, visit: ScreenTag) -> Self {
        match self {
            Msg::Status { level, text, .. } => Msg::Status { level, text, tag: Some(visit) },
            other => other,
        }
    }
}

/// A task that resolves immediately.
pub fn ready(msg: Msg) -> Task { futures::future::ready(msg).boxed() }
