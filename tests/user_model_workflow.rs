use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use admin_model::{
    ChildModel, ChildModelOptions, FieldRenderResolver, FieldRenderer, MemoryAdapter, ModelError,
    ModelRuntime, ModelSchema, NavTarget, Predicate, QueryOption, QueryPage, QueryPatch,
    RestAdapter, RuntimeConfig, SaveOptions, UiBridge, Wheres,
};

// Adapter wrapper for observing and slowing down runtime calls.
struct TestAdapter {
    inner: MemoryAdapter,
    query_calls: AtomicU64,
    query_delay_ms: AtomicU64,
}

impl TestAdapter {
    fn new(inner: MemoryAdapter) -> Self {
        Self {
            inner,
            query_calls: AtomicU64::new(0),
            query_delay_ms: AtomicU64::new(0),
        }
    }

    fn query_count(&self) -> u64 {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn set_query_delay(&self, ms: u64) {
        self.query_delay_ms.store(ms, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RestAdapter for TestAdapter {
    async fn get(&self, id: &String) -> Result<Value, ModelError> {
        self.inner.get(id).await
    }

    async fn query(&self, option: &QueryOption, wheres: &Wheres) -> Result<QueryPage, ModelError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.query(option, wheres).await
    }

    async fn save(&self, item: &Value, partial: bool) -> Result<Value, ModelError> {
        self.inner.save(item, partial).await
    }

    async fn delete(&self, id: &String) -> Result<(), ModelError> {
        self.inner.delete(id).await
    }
}

// Bridge that records notifications and navigation instead of rendering.
#[derive(Default)]
struct RecordingBridge {
    messages: Mutex<Vec<String>>,
    navigations: Mutex<Vec<NavTarget>>,
}

impl UiBridge for RecordingBridge {
    fn navigate(&self, target: NavTarget) {
        self.navigations.lock().unwrap().push(target);
    }

    fn success(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn user_schema() -> ModelSchema {
    serde_json::from_value(json!({
        "name": "User",
        "resource": "users",
        "title": "User",
        "properties": [
            { "name": "id", "type": "number", "title": "User ID" },
            { "name": "name", "type": "string" },
            { "name": "email", "type": "string", "format": "email" },
            { "name": "type", "type": "string", "enum": ["Normal", "Super"] },
            { "name": "website", "type": "string" },
            { "name": "profile", "type": "object" },
            { "name": "avatar", "type": "string", "canOrder": false }
        ],
        "permission": { "view": true, "add": true, "edit": true, "delete": true },
        "searchFields": ["name", "email"],
        "listFields": ["id", "name", "email"],
        "required": ["name"],
        "readonly": ["id"]
    }))
    .unwrap()
}

fn seed_users() -> Vec<Value> {
    vec![
        json!({ "id": 1, "name": "Alice", "email": "alice@example.com", "type": "Normal" }),
        json!({ "id": 2, "name": "Bob", "email": "bob@example.com", "type": "Super" }),
        json!({ "id": 3, "name": "Carol", "email": "carol@other.net", "type": "Normal" }),
    ]
}

struct Harness {
    runtime: Arc<ModelRuntime>,
    adapter: Arc<TestAdapter>,
    bridge: Arc<RecordingBridge>,
}

fn harness_with_rows(rows: Vec<Value>) -> Harness {
    let schema = Arc::new(user_schema());
    let adapter = Arc::new(TestAdapter::new(MemoryAdapter::with_rows(
        schema.clone(),
        rows,
    )));
    let bridge = Arc::new(RecordingBridge::default());
    let runtime = Arc::new(ModelRuntime::new(
        schema,
        adapter.clone(),
        bridge.clone(),
        RuntimeConfig::default(),
    ));
    Harness { runtime, adapter, bridge }
}

fn harness() -> Harness {
    harness_with_rows(seed_users())
}

#[tokio::test]
async fn query_populates_list_and_cache() {
    let h = harness();
    let page = h.runtime.query(None).await.unwrap();
    assert_eq!(page.total, 3);

    let store = h.runtime.store();
    assert_eq!(store.ids.get(), vec!["1", "2", "3"]);
    assert_eq!(store.count.get(), 3);
    assert_eq!(store.item(&"2".to_string()).get().unwrap()["name"], "Bob");
    assert!(!store.loading(admin_model::ops::ITEMS).get());
}

#[tokio::test]
async fn pagination_figures_follow_skip_and_limit() {
    let h = harness();
    h.runtime
        .query(Some(QueryPatch { limit: Some(2), ..QueryPatch::default() }))
        .await
        .unwrap();

    let pagination = h.runtime.pagination();
    assert_eq!(pagination.page_count, 2); // ceil(3/2)
    assert_eq!(pagination.active_page, 1);

    h.runtime.change_page(2).await.unwrap();
    let pagination = h.runtime.pagination();
    assert_eq!(pagination.active_page, 2);
    assert_eq!(h.runtime.store().ids.get().len(), 1);
}

#[tokio::test]
async fn changing_page_size_resets_to_first_page() {
    let h = harness();
    h.runtime
        .query(Some(QueryPatch { limit: Some(2), skip: Some(2), ..QueryPatch::default() }))
        .await
        .unwrap();
    assert_eq!(h.runtime.pagination().active_page, 2);

    h.runtime.set_page_size(50).await.unwrap();
    let option = h.runtime.store().option.get();
    assert_eq!(option.skip, 0);
    assert_eq!(option.limit, 50);
    assert_eq!(h.runtime.pagination().active_page, 1);
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let h = harness();
    let saved = h
        .runtime
        .save(
            json!({ "name": "Dave", "email": "dave@example.com" }),
            SaveOptions::default(),
        )
        .await
        .unwrap();
    let id = admin_model::item_id(&saved).unwrap();

    let loaded = h.runtime.load(Some(&id), None).await.unwrap();
    assert_eq!(loaded.data["name"], "Dave");
    assert_eq!(loaded.data["email"], "dave@example.com");
    assert_eq!(loaded.title, "Edit User");

    // unchanged idempotent re-save
    let resaved = h.runtime.save(loaded.data.clone(), SaveOptions::default()).await.unwrap();
    assert_eq!(resaved, loaded.data);
}

#[tokio::test]
async fn load_without_id_synthesizes_default_item() {
    let h = harness();
    let loaded = h
        .runtime
        .load(None, Some(&json!({ "type": "Super" })))
        .await
        .unwrap();
    assert_eq!(loaded.title, "Create User");
    assert_eq!(loaded.data["type"], "Super");
    assert!(admin_model::item_id(&loaded.data).is_none());
}

#[tokio::test]
async fn search_builds_or_predicate_and_preserves_other_filters() {
    let h = harness();
    let mut wheres = Wheres::new();
    wheres.insert("type".to_string(), Predicate::eq("Normal"));
    h.runtime
        .query(Some(QueryPatch { wheres: Some(wheres), ..QueryPatch::default() }))
        .await
        .unwrap();

    h.runtime.search("bob").await.unwrap();
    let wheres = serde_json::to_value(h.runtime.store().wheres.get()).unwrap();
    assert_eq!(
        wheres,
        json!({
            "searchbar": { "or": [
                { "name": { "like": "bob" } },
                { "email": { "like": "bob" } }
            ]},
            "type": "Normal"
        })
    );

    h.runtime.search("").await.unwrap();
    let wheres = serde_json::to_value(h.runtime.store().wheres.get()).unwrap();
    assert_eq!(wheres, json!({ "type": "Normal" }));
}

#[tokio::test]
async fn search_with_single_field_skips_or_wrapper() {
    let mut schema = user_schema();
    schema.search_fields = vec!["name".to_string()];
    let schema = Arc::new(schema);
    let adapter = Arc::new(TestAdapter::new(MemoryAdapter::with_rows(
        schema.clone(),
        seed_users(),
    )));
    let runtime = ModelRuntime::new(
        schema,
        adapter,
        Arc::new(RecordingBridge::default()),
        RuntimeConfig::default(),
    );

    runtime.search("x").await.unwrap();
    let wheres = serde_json::to_value(runtime.store().wheres.get()).unwrap();
    assert_eq!(wheres, json!({ "searchbar": { "name": { "like": "x" } } }));
}

#[tokio::test]
async fn search_resets_pagination_and_filters_rows() {
    let h = harness();
    h.runtime
        .query(Some(QueryPatch { limit: Some(1), skip: Some(2), ..QueryPatch::default() }))
        .await
        .unwrap();

    let page = h.runtime.search("example.com").await.unwrap();
    assert_eq!(h.runtime.store().option.get().skip, 0);
    assert_eq!(page.total, 2); // alice and bob match, carol is on other.net
}

#[tokio::test]
async fn displayed_columns_follow_schema_until_deselected() {
    let h = harness();
    h.runtime.query(None).await.unwrap();
    assert_eq!(h.runtime.visible_fields(), vec!["id", "name", "email"]);

    h.runtime.change_field_display("email", false);
    assert_eq!(h.runtime.visible_fields(), vec!["id", "name"]);

    h.runtime.change_field_display("website", true);
    assert_eq!(h.runtime.visible_fields(), vec!["id", "name", "website"]);
}

#[tokio::test]
async fn delete_unselects_and_refreshes_exactly_once() {
    let h = harness();
    h.runtime.query(None).await.unwrap();
    let baseline = h.adapter.query_count();

    // deleting an unselected id is a selection no-op, not an error
    h.runtime.delete_item(&"3".to_string()).await.unwrap();
    assert!(!h.runtime.store().is_selected(&"3".to_string()));
    assert_eq!(h.adapter.query_count(), baseline + 1);
    assert_eq!(h.runtime.store().count.get(), 2);

    let messages = h.bridge.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m == "Delete User success"));
}

#[tokio::test]
async fn delete_failure_leaves_selection_untouched() {
    let h = harness();
    h.runtime.query(None).await.unwrap();
    h.runtime.select(&"1".to_string(), true);
    let baseline = h.adapter.query_count();

    let err = h.runtime.delete_item(&"99".to_string()).await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
    assert!(h.runtime.store().is_selected(&"1".to_string()));
    assert_eq!(h.adapter.query_count(), baseline);
}

#[tokio::test]
async fn create_then_partial_save_keeps_unrelated_fields() {
    let h = harness();
    h.runtime
        .save(json!({ "name": "A" }), SaveOptions::default())
        .await
        .unwrap();

    // partial edit of a seeded record: patched field changes, the rest stays
    h.runtime
        .save(json!({ "id": 2, "name": "B" }), SaveOptions::partial())
        .await
        .unwrap();
    let cached = h.runtime.store().item(&"2".to_string()).get().unwrap();
    assert_eq!(cached["name"], "B");
    assert_eq!(cached["email"], "bob@example.com");
    assert_eq!(cached["type"], "Super");
}

#[tokio::test]
async fn partial_marker_on_item_forces_partial_save() {
    let h = harness();
    let saved = h
        .runtime
        .save(
            json!({ "id": 2, "name": "Bobby", "__partial__": true }),
            SaveOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(saved["email"], "bob@example.com");
    assert!(saved.get("__partial__").is_none());
}

#[tokio::test]
async fn validation_failure_propagates_fields_and_spares_cache() {
    let h = harness();
    h.runtime.query(None).await.unwrap();

    let err = h
        .runtime
        .save(json!({ "id": 2, "name": "" }), SaveOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.fields().unwrap().get("name"), Some("is required"));

    let cached = h.runtime.store().item(&"2".to_string()).get().unwrap();
    assert_eq!(cached["name"], "Bob");
    assert!(!h.runtime.store().loading(admin_model::ops::SAVE).get());
}

#[tokio::test]
async fn failed_load_keeps_other_cache_entries() {
    let h = harness();
    h.runtime.load(Some(&"1".to_string()), None).await.unwrap();

    let err = h.runtime.load(Some(&"9".to_string()), None).await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
    assert!(!h.runtime.store().loading(admin_model::ops::GET).get());

    let cached = h.runtime.store().item(&"1".to_string()).get().unwrap();
    assert_eq!(cached["name"], "Alice");
}

#[tokio::test]
async fn query_failure_resets_list_to_empty_baseline() {
    struct FailingAdapter;
    #[async_trait::async_trait]
    impl RestAdapter for FailingAdapter {
        async fn get(&self, id: &String) -> Result<Value, ModelError> {
            Err(ModelError::NotFound(id.clone()))
        }
        async fn query(&self, _: &QueryOption, _: &Wheres) -> Result<QueryPage, ModelError> {
            Err(ModelError::Transport("connection refused".to_string()))
        }
        async fn save(&self, _: &Value, _: bool) -> Result<Value, ModelError> {
            Err(ModelError::Transport("connection refused".to_string()))
        }
        async fn delete(&self, _: &String) -> Result<(), ModelError> {
            Err(ModelError::Transport("connection refused".to_string()))
        }
    }

    let schema = Arc::new(user_schema());
    let runtime = ModelRuntime::new(
        schema,
        Arc::new(FailingAdapter),
        Arc::new(RecordingBridge::default()),
        RuntimeConfig::default(),
    );
    runtime.store().ids.set(vec!["1".to_string()]);
    runtime.store().count.set(1);

    let err = runtime.query(None).await.unwrap_err();
    assert!(matches!(err, ModelError::Transport(_)));
    assert!(runtime.store().ids.get().is_empty());
    assert_eq!(runtime.store().count.get(), 0);
    assert!(!runtime.store().loading(admin_model::ops::ITEMS).get());
}

#[tokio::test]
async fn superseded_query_does_not_clobber_newer_result() {
    let h = harness();

    // slow query paging to page 1, immediately superseded by a fast one
    h.adapter.set_query_delay(80);
    let slow = {
        let runtime = h.runtime.clone();
        tokio::spawn(async move {
            runtime
                .query(Some(QueryPatch { limit: Some(1), ..QueryPatch::default() }))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.adapter.set_query_delay(0);
    h.runtime
        .query(Some(QueryPatch { limit: Some(2), ..QueryPatch::default() }))
        .await
        .unwrap();

    slow.await.unwrap().unwrap();
    // the fast call owns the store; the stale settlement wrote nothing
    assert_eq!(h.runtime.store().option.get().limit, 2);
    assert_eq!(h.runtime.store().ids.get().len(), 2);
}

#[tokio::test]
async fn navigation_events_reach_the_bridge() {
    let h = harness();
    h.runtime.on_add();
    h.runtime.on_edit(&"2".to_string());
    h.runtime.on_back();

    let navigations = h.bridge.navigations.lock().unwrap();
    assert_eq!(
        *navigations,
        vec![
            NavTarget::Path("../add".to_string()),
            NavTarget::Path("../2/edit".to_string()),
            NavTarget::Back,
        ]
    );
}

#[tokio::test]
async fn edit_navigation_escapes_unsafe_ids() {
    let h = harness();
    h.runtime.on_edit(&"a/b".to_string());

    let navigations = h.bridge.navigations.lock().unwrap();
    assert_eq!(*navigations, vec![NavTarget::Path("../a%2Fb/edit".to_string())]);
}

#[tokio::test]
async fn column_ordering_follows_declared_orderability() {
    let h = harness();
    assert!(h.runtime.can_order("name"));
    assert!(!h.runtime.can_order("profile")); // object-typed columns opt out
    assert!(!h.runtime.can_order("avatar")); // explicit canOrder: false
    assert!(!h.runtime.can_order("missing"));

    h.runtime.change_order("name", true).await.unwrap();
    assert_eq!(h.runtime.store().option.get().sort.as_deref(), Some("-name"));
    assert_eq!(h.runtime.store().ids.get(), vec!["3", "2", "1"]);

    h.runtime.change_order("name", false).await.unwrap();
    assert_eq!(h.runtime.store().option.get().sort.as_deref(), Some("name"));
    assert_eq!(h.runtime.store().ids.get(), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn list_rows_carry_items_and_default_actions() {
    let h = harness();
    h.runtime.query(None).await.unwrap();
    h.runtime.select(&"2".to_string(), true);

    let list = h.runtime.list();
    assert!(!list.loading);
    assert_eq!(list.fields, vec!["id", "name", "email"]);
    assert_eq!(list.rows.len(), 3);

    let (id, row) = &list.rows[1];
    assert_eq!(id.as_str(), "2");
    assert!(row.selected);
    assert_eq!(row.item.as_ref().unwrap()["name"], "Bob");
    assert_eq!(row.actions, vec!["edit", "delete"]);
    assert!(!list.rows[0].1.selected);
}

#[test]
fn field_renderers_memoize_per_field() {
    let schema = Arc::new(user_schema());
    let adapter = Arc::new(TestAdapter::new(MemoryAdapter::new(schema.clone())));
    let mut runtime = ModelRuntime::new(
        schema,
        adapter,
        Arc::new(RecordingBridge::default()),
        RuntimeConfig::default(),
    );

    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let resolver: FieldRenderResolver = Arc::new(move |_property, _field| {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(FieldRenderer::named("text"))
    });
    runtime.set_resolvers(vec![resolver]);

    assert_eq!(runtime.field_renderer("name"), Some(FieldRenderer::named("text")));
    runtime.field_renderer("name");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    runtime.field_renderer("email");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ---- relation panels ----

fn post_schema() -> ModelSchema {
    serde_json::from_value(json!({
        "name": "Post",
        "resource": "posts",
        "title": "Post",
        "properties": [
            { "name": "id", "type": "number" },
            { "name": "title", "type": "string" },
            { "name": "userId", "type": "number" }
        ],
        "permission": { "view": true, "add": true, "edit": true, "delete": true },
        "searchFields": ["title"],
        "listFields": ["id", "title"],
        "required": ["title"]
    }))
    .unwrap()
}

fn post_adapter(schema: &Arc<ModelSchema>) -> Arc<TestAdapter> {
    Arc::new(TestAdapter::new(MemoryAdapter::with_rows(
        schema.clone(),
        vec![
            json!({ "id": 10, "title": "First", "userId": 1 }),
            json!({ "id": 11, "title": "Second", "userId": 2 }),
            json!({ "id": 12, "title": "Third", "userId": 1 }),
        ],
    )))
}

#[tokio::test]
async fn child_model_scopes_list_to_parent() {
    let schema = Arc::new(post_schema());
    let adapter = post_adapter(&schema);
    let parent = json!({ "id": 1, "name": "Alice" });

    let panel = ChildModel::open(
        &schema,
        &parent,
        ChildModelOptions {
            ref_data: Some(json!({ "userId": 1 })),
            ..ChildModelOptions::referencing("userId")
        },
        adapter.clone(),
        Arc::new(RecordingBridge::default()),
        RuntimeConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(panel.key(), "Post_1");
    assert_eq!(panel.runtime().store().ids.get(), vec!["10", "12"]);

    // derived permissions: top-level edit off, delegated to child_edit
    assert!(!panel.runtime().permissions().can_edit);
    assert!(panel.can_child_edit());
    assert!(panel.can_add());
    assert!(panel
        .runtime()
        .schema()
        .row_actions()
        .contains(&"child-edit".to_string()));
}

#[tokio::test]
async fn child_save_merges_refs_and_refreshes_panel() {
    let schema = Arc::new(post_schema());
    let adapter = post_adapter(&schema);
    let parent = json!({ "id": 1 });

    let panel = ChildModel::open(
        &schema,
        &parent,
        ChildModelOptions {
            ref_data: Some(json!({ "userId": 1 })),
            ..ChildModelOptions::referencing("userId")
        },
        adapter.clone(),
        Arc::new(RecordingBridge::default()),
        RuntimeConfig::default(),
    )
    .await
    .unwrap();

    let saved = panel
        .save_child(json!({ "title": "Fourth" }), false)
        .await
        .unwrap();
    assert_eq!(saved["userId"], 1);
    assert_eq!(panel.runtime().store().ids.get().len(), 3);
}

#[tokio::test]
async fn concurrent_child_panels_do_not_share_state() {
    let schema = Arc::new(post_schema());
    let adapter = post_adapter(&schema);
    let bridge = Arc::new(RecordingBridge::default());

    let panel_one = ChildModel::open(
        &schema,
        &json!({ "id": 1 }),
        ChildModelOptions::referencing("userId"),
        adapter.clone(),
        bridge.clone(),
        RuntimeConfig::default(),
    )
    .await
    .unwrap();
    let panel_two = ChildModel::open(
        &schema,
        &json!({ "id": 2 }),
        ChildModelOptions::referencing("userId"),
        adapter.clone(),
        bridge.clone(),
        RuntimeConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(panel_one.key(), "Post_1");
    assert_eq!(panel_two.key(), "Post_2");
    assert_eq!(panel_one.runtime().store().ids.get(), vec!["10", "12"]);
    assert_eq!(panel_two.runtime().store().ids.get(), vec!["11"]);

    panel_one.runtime().select(&"10".to_string(), true);
    assert!(panel_two.runtime().store().selected.get().is_empty());
}

#[tokio::test]
async fn child_form_load_merges_ref_data() {
    let schema = Arc::new(post_schema());
    let adapter = post_adapter(&schema);

    let panel = ChildModel::open(
        &schema,
        &json!({ "id": 1 }),
        ChildModelOptions {
            ref_data: Some(json!({ "userId": 1 })),
            ..ChildModelOptions::referencing("userId")
        },
        adapter,
        Arc::new(RecordingBridge::default()),
        RuntimeConfig::default(),
    )
    .await
    .unwrap();

    let form = panel.load_form(None).await.unwrap();
    assert_eq!(form.title, "Create Post");
    assert_eq!(form.data["userId"], 1);
}
