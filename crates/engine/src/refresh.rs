//! Refresh task body and relationship dispatch.

use std::sync::Arc;
use std::time::Instant;

use kubedeck_api::{Relation, RelationKey, RepoError, RepoResult, Repository};
use kubedeck_core::{FilterContext, Item, ResourceKind};
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::spec::Behavior;
use crate::{Msg, ScreenTag};

/// Fetch `kind`, scoped by `ctx` when present. The relation is chosen by the
/// context field; the source object is `metadata.kind/value` in
/// `metadata.namespace`.
pub async fn fetch(repo: &dyn Repository, kind: &ResourceKind, ctx: Option<&FilterContext>) -> RepoResult<Vec<Item>> {
    let Some(ctx) = ctx else {
        return repo.list_resources(kind).await;
    };
    let relation = Relation::from_field(&ctx.field)
        .ok_or_else(|| RepoError::Unsupported(format!("{} filtered by {:?}", kind.kind, ctx.field)))?;
    let key = RelationKey::new(ctx.kind(), &ctx.value, ctx.namespace());
    debug!(gvk = %kind, relation = %relation, key = %key, "refresh: scoped fetch");
    match relation {
        Relation::Owner => repo.list_by_owner(kind, &key).await,
        Relation::Node => repo.list_by_node(kind, &key).await,
        Relation::Selector => repo.list_by_selector(kind, &key).await,
        Relation::Namespace => repo.list_by_namespace(kind, &key).await,
        Relation::Volume => repo.list_by_volume(kind, &key).await,
        Relation::Pvc => repo.list_by_pvc(kind, &key).await,
        Relation::TargetRef => repo.list_by_target_ref(kind, &key).await,
    }
}

/// Values a refresh task closes over; copied out of the screen when the task
/// is created.
pub struct RefreshJob {
    pub repo: Arc<dyn Repository>,
    pub behavior: Arc<dyn Behavior>,
    pub kind: ResourceKind,
    pub title: String,
    pub filter: Option<FilterContext>,
    pub tag: ScreenTag,
}

impl RefreshJob {
    /// Engage the source, check its sync state, then fetch.
    pub async fn run(self) -> Msg {
        let started = Instant::now();
        counter!("screen_refresh_total", 1u64);
        if self.behavior.uses_repository() {
            if let Err(e) = self.repo.ensure_loaded(&self.kind).await {
                warn!(screen = %self.tag.screen_id, error = %e, "refresh: ensure_loaded failed");
                return Msg::error(format!("{}: {}", self.title, e)).for_visit(self.tag);
            }
            if let Some(e) = self.repo.sync_error(&self.kind) {
                warn!(screen = %self.tag.screen_id, error = %e, "refresh: sync failed");
                return Msg::error(format!("{}: {}", self.title, e)).for_visit(self.tag);
            }
            if !self.repo.is_ready(&self.kind) {
                debug!(screen = %self.tag.screen_id, "refresh: source not ready");
                return Msg::loading(format!("loading {}...", self.title)).for_visit(self.tag);
            }
        }
        match self.behavior.fetch(self.repo.as_ref(), &self.kind, self.filter.as_ref()).await {
            Ok(items) => {
                let duration = started.elapsed();
                histogram!("screen_refresh_ms", duration.as_secs_f64() * 1_000.0);
                info!(screen = %self.tag.screen_id, items = items.len(), took_ms = %duration.as_millis(), "refresh: done");
                Msg::RefreshComplete { tag: self.tag, items, duration }
            }
            Err(e) => {
                warn!(screen = %self.tag.screen_id, error = %e, "refresh: fetch failed");
                Msg::error(format!("{}: {}", self.title, e)).for_visit(self.tag)
            }
        }
    }
}
