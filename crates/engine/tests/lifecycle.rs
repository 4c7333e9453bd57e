#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use kubedeck_api::{MockRepository, Relation, RepoError};
use kubedeck_core::columns::builtin_columns_for;
use kubedeck_core::config::EngineConfig;
use kubedeck_core::{field, FilterContext, Item, ObjectMeta, ResourceItem, ResourceKind};
use kubedeck_engine::registry::{self, Registry};
use kubedeck_engine::{Action, Msg, RefreshPolicy, Screen, ScreenSpec, ScreenTag, StatusLevel, Task};
use smallvec::smallvec;

fn pods_kind() -> ResourceKind { ResourceKind::new("", "v1", "Pod", true) }

fn pod(name: &str) -> Item {
    Arc::new(ResourceItem {
        kind: "Pod".into(),
        meta: ObjectMeta { namespace: Some("shop".into()), name: name.into(), ..Default::default() },
        columns: smallvec![("Status".to_string(), "Running".to_string())],
        extra: Default::default(),
    })
}

fn pods(names: &[&str]) -> Vec<Item> { names.iter().map(|n| pod(n)).collect() }

fn spec() -> ScreenSpec {
    ScreenSpec::new("pods", "Pods", pods_kind(), builtin_columns_for("Pod", true))
        .refresh(RefreshPolicy::every(Duration::from_millis(5)))
}

fn screen_with(spec: ScreenSpec, repo: Arc<MockRepository>) -> Screen {
    Screen::new(Arc::new(spec), repo, Arc::new(EngineConfig::default()))
}

fn complete(screen: &Screen, items: Vec<Item>) -> Msg {
    Msg::RefreshComplete { tag: screen.tag(), items, duration: Duration::from_millis(1) }
}

fn selected_name(screen: &Screen) -> String {
    screen.selected().map(|i| field::get_string(i.as_ref(), "Name")).unwrap_or_default()
}

async fn run_all(tasks: Vec<Task>) -> Vec<Msg> {
    let mut out = Vec::new();
    for t in tasks {
        out.push(t.await);
    }
    out
}

fn status_of(msg: &Msg) -> Option<(StatusLevel, String)> {
    match msg {
        Msg::Status { level, text, .. } => Some((*level, text.clone())),
        _ => None,
    }
}

#[tokio::test]
async fn cold_start_emits_loading_then_refresh() {
    let repo = Arc::new(MockRepository::new());
    repo.set_ready(&pods_kind(), false);
    let mut screen = screen_with(spec(), repo.clone());

    let msgs = run_all(screen.enter()).await;
    assert_eq!(msgs.len(), 2);
    assert_eq!(status_of(&msgs[0]).map(|s| s.0), Some(StatusLevel::Loading));
    // Still syncing: the refresh itself reports loading and never lists.
    assert_eq!(status_of(&msgs[1]).map(|s| s.0), Some(StatusLevel::Loading));
    assert_eq!(repo.calls(), vec!["ensure:v1/Pod".to_string()]);

    // The first status starts exactly one tick chain.
    assert!(!screen.is_initialized());
    assert_eq!(screen.update(msgs[0].clone()).len(), 1);
    assert!(screen.is_initialized());
    assert!(screen.update(msgs[1].clone()).is_empty());
}

#[tokio::test]
async fn warm_start_refreshes_directly() {
    let repo = Arc::new(MockRepository::new());
    repo.set_items(&pods_kind(), pods(&["a", "b"]));
    let mut screen = screen_with(spec(), repo.clone());

    let msgs = run_all(screen.enter()).await;
    assert_eq!(msgs.len(), 1);
    let tasks = screen.update(msgs[0].clone());
    assert_eq!(tasks.len(), 1, "first refresh schedules the first tick");
    assert_eq!(screen.items().len(), 2);
    assert_eq!(screen.table().rows().len(), 2);

    // The scheduled tick belongs to this visit and chains refresh + next tick.
    let tick = run_all(tasks).await.remove(0);
    match &tick {
        Msg::Tick(tag) => assert_eq!(tag, &screen.tag()),
        other => panic!("expected tick, got {:?}", other),
    }
    assert_eq!(screen.update(tick).len(), 2);
}

#[tokio::test]
async fn tick_isolation() {
    let repo = Arc::new(MockRepository::new());
    let mut screen = screen_with(spec(), repo.clone());
    let _ = screen.enter();
    let before = screen.tag();

    let foreign = Msg::Tick(ScreenTag { screen_id: "services".into(), epoch: before.epoch });
    assert!(screen.update(foreign).is_empty());
    assert!(!screen.is_initialized());

    // A tick from a previous visit is stale too.
    let _ = screen.enter();
    assert!(screen.update(Msg::Tick(before.clone())).is_empty());
    assert!(screen.update(Msg::RefreshComplete { tag: before, items: pods(&["x"]), duration: Duration::ZERO }).is_empty());
    assert!(screen.items().is_empty());
    assert!(repo.calls().is_empty(), "no task was run");
}

#[tokio::test]
async fn status_from_an_earlier_visit_is_ignored() {
    let repo = Arc::new(MockRepository::new());
    let mut screen = screen_with(spec(), repo);
    let _ = screen.enter();
    let earlier = screen.tag();
    let _ = screen.enter();

    assert!(screen.update(Msg::error("Pods: boom").for_visit(earlier)).is_empty());
    assert!(!screen.is_initialized());

    let current = screen.tag();
    assert_eq!(screen.update(Msg::loading("loading Pods...").for_visit(current)).len(), 1, "first tick scheduled");
    assert!(screen.is_initialized());
}

#[tokio::test]
async fn disabled_refresh_never_ticks() {
    let repo = Arc::new(MockRepository::new());
    let mut screen = screen_with(spec().refresh(RefreshPolicy::disabled()), repo);
    let _ = screen.enter();
    assert!(screen.update(complete(&screen, pods(&["a"]))).is_empty());
    let tag = screen.tag();
    assert!(screen.update(Msg::Tick(tag)).is_empty());
}

#[tokio::test]
async fn cursor_follows_selected_row_across_refresh() {
    let repo = Arc::new(MockRepository::new());
    let mut screen = screen_with(spec(), repo);
    let _ = screen.enter();
    screen.update(complete(&screen, pods(&["a", "b", "c"])));
    screen.update(Msg::Action(Action::Down));
    assert_eq!(selected_name(&screen), "b");

    screen.update(complete(&screen, pods(&["new", "a", "b", "c", "d"])));
    assert_eq!(selected_name(&screen), "b");
    assert_eq!(screen.cursor(), 2);

    screen.update(complete(&screen, pods(&["a", "c"])));
    assert_eq!(screen.cursor(), 1);
    assert_eq!(selected_name(&screen), "c");

    screen.update(complete(&screen, Vec::new()));
    assert_eq!(screen.cursor(), 0);
    assert!(screen.selected().is_none());
}

#[tokio::test]
async fn untracked_screens_keep_the_index() {
    let repo = Arc::new(MockRepository::new());
    let mut screen = screen_with(spec().track_selection(false), repo);
    let _ = screen.enter();
    screen.update(complete(&screen, pods(&["a", "b", "c"])));
    screen.update(Msg::Action(Action::Down));
    screen.update(complete(&screen, pods(&["new", "a", "b", "c"])));
    assert_eq!(screen.cursor(), 1);
    assert_eq!(selected_name(&screen), "a");
}

#[tokio::test]
async fn filtering_resets_cursor_and_is_pure() {
    let repo = Arc::new(MockRepository::new());
    let mut screen = screen_with(spec(), repo);
    let _ = screen.enter();
    let items = pods(&["api-1", "web-1", "web-2", "db-0"]);
    screen.update(complete(&screen, items));
    screen.update(Msg::Action(Action::Bottom));
    assert_eq!(screen.cursor(), 3);

    screen.update(Msg::Action(Action::SetFilter("web".into())));
    assert_eq!(screen.cursor(), 0);
    assert_eq!(screen.filtered().len(), 2);
    assert_eq!(screen.table().rows().len(), 2);

    screen.update(Msg::Action(Action::SetFilter("!web".into())));
    assert_eq!(screen.filtered().len(), 2);

    screen.update(Msg::Action(Action::SetFilter(String::new())));
    let names: Vec<String> = screen.filtered().iter().map(|i| field::get_string(i.as_ref(), "Name")).collect();
    assert_eq!(names, vec!["api-1", "web-1", "web-2", "db-0"]);
}

#[tokio::test]
async fn fetch_failure_keeps_last_good_items() {
    let repo = Arc::new(MockRepository::new());
    repo.set_items(&pods_kind(), pods(&["a", "b"]));
    let mut screen = screen_with(spec(), repo.clone());
    let first = run_all(screen.enter()).await.remove(0);
    screen.update(first);

    repo.set_fetch_error(Some(RepoError::Internal("connection reset".into())));
    let msg = screen.refresh().await;
    let (level, text) = status_of(&msg).expect("status");
    assert_eq!(level, StatusLevel::Error);
    assert!(text.contains("connection reset"), "{text}");
    screen.update(msg);
    assert_eq!(screen.items().len(), 2);
}

#[tokio::test]
async fn sync_failure_is_an_error_status() {
    let repo = Arc::new(MockRepository::new());
    repo.set_sync_error(&pods_kind(), Some(RepoError::SyncFailed { kind: "v1/Pod".into(), reason: "forbidden".into() }));
    let screen = screen_with(spec(), repo.clone());
    let msg = screen.refresh().await;
    assert_eq!(status_of(&msg).map(|s| s.0), Some(StatusLevel::Error));
    assert!(!repo.calls().iter().any(|c| c.starts_with("list:")));
}

#[tokio::test]
async fn filter_context_dispatches_relationship_queries() {
    let repo = Arc::new(MockRepository::new());
    repo.set_related(Relation::Owner, "web-7d9", pods(&["web-1"]));
    let mut screen = screen_with(spec(), repo.clone());
    screen.set_filter_context(Some(FilterContext::new("owner", "web-7d9").with("namespace", "shop").with("kind", "ReplicaSet")));
    let msg = screen.refresh().await;
    assert!(matches!(&msg, Msg::RefreshComplete { items, .. } if items.len() == 1));
    assert_eq!(repo.calls(), vec!["ensure:v1/Pod".to_string(), "owner:v1/Pod:ReplicaSet/shop/web-7d9".to_string()]);
    assert!(screen.title().contains("owner ReplicaSet/web-7d9"));

    screen.set_filter_context(Some(FilterContext::new("labels", "app=web")));
    let msg = screen.refresh().await;
    assert_eq!(status_of(&msg).map(|s| s.0), Some(StatusLevel::Error));

    screen.abandon();
    assert!(screen.filter_context().is_none());
}

#[tokio::test]
async fn enter_on_a_row_routes_through_the_registry() {
    let repo = Arc::new(MockRepository::new());
    let reg = Registry::builtin(&EngineConfig::default());
    let deployments = reg.get(registry::DEPLOYMENTS).expect("deployments");
    let mut screen = Screen::new(deployments, repo, Arc::new(EngineConfig::default()));
    let _ = screen.enter();

    // Nothing selected yet: Enter is a no-op.
    assert!(screen.update(Msg::Action(Action::Enter)).is_empty());

    let web: Item = Arc::new(ResourceItem {
        kind: "Deployment".into(),
        meta: ObjectMeta { namespace: Some("shop".into()), name: "web".into(), ..Default::default() },
        ..Default::default()
    });
    screen.update(complete(&screen, vec![web]));
    let msgs = run_all(screen.update(Msg::Action(Action::Enter))).await;
    match &msgs[..] {
        [Msg::ScreenSwitch { screen_id, filter: Some(f) }] => {
            assert_eq!(screen_id, registry::REPLICASETS);
            assert_eq!(f.field, "owner");
            assert_eq!(f.kind(), "Deployment");
        }
        other => panic!("unexpected {:?}", other),
    }

    let ops = run_all(screen.update(Msg::Action(Action::Shortcut('r')))).await;
    match &ops[..] {
        [Msg::OperationRequested { op, key, .. }] => {
            assert_eq!(op, "restart");
            assert_eq!(key, "shop/web");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(screen.update(Msg::Action(Action::Shortcut('?'))).is_empty());
}

#[tokio::test]
async fn resize_drops_optional_columns() {
    let repo = Arc::new(MockRepository::new());
    let mut screen = screen_with(spec(), repo);
    screen.update(Msg::Resize { width: 200, height: 30 });
    let wide = screen.table().columns().len();
    assert_eq!(screen.hidden_count(), 0);
    screen.update(Msg::Resize { width: 60, height: 30 });
    assert!(screen.table().columns().len() < wide);
    assert!(screen.hidden_count() > 0);
    let titles: Vec<&str> = screen.table().columns().iter().map(|c| c.title.as_str()).collect();
    assert!(titles.contains(&"NAME") && titles.contains(&"AGE"));
}

#[tokio::test]
async fn contexts_screen_lists_config_without_repository() {
    let repo = Arc::new(MockRepository::new());
    repo.set_ready(&ResourceKind::new("", "v1", "Context", false), false);
    let config = EngineConfig { contexts: vec!["dev".into(), "prod".into()], current_context: Some("prod".into()), ..Default::default() };
    let reg = Registry::builtin(&config);
    let mut screen = Screen::new(reg.get(registry::CONTEXTS).expect("contexts"), repo.clone(), Arc::new(config));
    let msgs = run_all(screen.enter()).await;
    assert_eq!(msgs.len(), 1);
    assert!(screen.update(msgs[0].clone()).is_empty(), "contexts never poll");
    assert_eq!(screen.items().len(), 2);
    assert!(repo.calls().is_empty());

    screen.update(Msg::Action(Action::Bottom));
    let out = run_all(screen.update(Msg::Action(Action::Enter))).await;
    assert!(matches!(&out[..], [Msg::ContextSwitch(name)] if name == "prod"));
}
