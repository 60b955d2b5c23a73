//! The model runtime: composes a schema, a reactive store and a REST adapter
//! into live CRUD state for one screen. Derived view-state lives in
//! `view.rs`, free-text search in `search.rs`, relation panels in
//! `children.rs`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::RuntimeConfig;
use crate::error::{self, ModelError};
use crate::logic::render::{default_resolvers, resolve, FieldRenderResolver, FieldRenderer};
use crate::model::{encode_id, item_id, Id, Item, ModelSchema, QueryPatch, PARTIAL_MARKER};
use crate::store::{ops, ModelStore, QueryPage, RestAdapter};
use crate::ui::{vars, NavTarget, UiBridge};

/// Result of [`ModelRuntime::load`]: the item data plus the screen title.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub data: Item,
    pub title: String,
}

#[derive(Clone, Default)]
pub struct SaveOptions {
    pub partial: bool,
    /// Replaces the default success notification text.
    pub success_message: Option<String>,
    /// Suppress the success notification entirely.
    pub silent: bool,
}

impl SaveOptions {
    pub fn partial() -> Self {
        Self { partial: true, ..Self::default() }
    }
}

pub struct ModelRuntime {
    schema: Arc<ModelSchema>,
    store: Arc<ModelStore>,
    adapter: Arc<dyn RestAdapter>,
    ui: Arc<dyn UiBridge>,
    config: RuntimeConfig,
    key: String,
    pub(crate) resolvers: Vec<FieldRenderResolver>,
    render_cache: RwLock<HashMap<String, Option<FieldRenderer>>>,
    query_epoch: AtomicU64,
}

impl ModelRuntime {
    pub fn new(
        schema: Arc<ModelSchema>,
        adapter: Arc<dyn RestAdapter>,
        ui: Arc<dyn UiBridge>,
        config: RuntimeConfig,
    ) -> Self {
        let key = schema.name.clone();
        Self::with_key(schema, adapter, ui, config, key)
    }

    /// Build a runtime with an explicit instance key. Relation panels use
    /// `{entity}_{parent_id}` keys so concurrent panels never share state.
    pub fn with_key(
        schema: Arc<ModelSchema>,
        adapter: Arc<dyn RestAdapter>,
        ui: Arc<dyn UiBridge>,
        config: RuntimeConfig,
        key: String,
    ) -> Self {
        let store = Arc::new(ModelStore::new(&schema, &config));
        Self {
            schema,
            store,
            adapter,
            ui,
            config,
            key,
            resolvers: default_resolvers(),
            render_cache: RwLock::new(HashMap::new()),
            query_epoch: AtomicU64::new(0),
        }
    }

    /// Replace the field render resolver chain. Clears the memo cache.
    pub fn set_resolvers(&mut self, resolvers: Vec<FieldRenderResolver>) {
        self.resolvers = resolvers;
        self.render_cache.write().clear();
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load an item for editing, or synthesize a default item for creation.
    ///
    /// With an id: serves the cached record when its id matches, otherwise
    /// fetches and replaces the cache entry on success only. A failed fetch
    /// leaves the previous entry untouched. Without an id: merges the
    /// schema's default value with any preset values.
    pub async fn load(&self, id: Option<&Id>, preset: Option<&Item>) -> Result<Loaded, ModelError> {
        let title_vars = vars(&[("title", self.schema.title())]);
        match id {
            Some(id) => {
                let title = self.ui.translate("Edit {{title}}", &title_vars);
                let cell = self.store.item(id);
                if let Some(data) = cell.get() {
                    if item_id(&data).as_deref() == Some(id.as_str()) {
                        return Ok(Loaded { data, title });
                    }
                }
                let loading = self.store.loading(ops::GET);
                loading.set(true);
                let result = self.adapter.get(id).await;
                loading.set(false);
                match result {
                    Ok(data) => {
                        cell.set(Some(data.clone()));
                        Ok(Loaded { data, title })
                    }
                    Err(err) => {
                        error::report(&err);
                        Err(err)
                    }
                }
            }
            None => Ok(Loaded {
                data: self.schema.default_item(preset),
                title: self.ui.translate("Create {{title}}", &title_vars),
            }),
        }
    }

    /// Save an item through the adapter. Partial mode is forced when the
    /// schema declares partial saves or the item carries the partial marker.
    /// On success the returned record replaces the cache entry at its id; on
    /// failure the cache is untouched and the structured error propagates.
    pub async fn save(&self, item: Item, options: SaveOptions) -> Result<Item, ModelError> {
        let mut item = item;
        let mut partial = options.partial || self.schema.partial_save;
        if let Some(obj) = item.as_object_mut() {
            if let Some(marker) = obj.remove(PARTIAL_MARKER) {
                partial = partial || marker != serde_json::Value::Bool(false);
            }
        }
        let creating = item_id(&item).is_none();

        let loading = self.store.loading(ops::SAVE);
        loading.set(true);
        let result = self.adapter.save(&item, partial).await;
        loading.set(false);

        match result {
            Ok(saved) => {
                if let Some(id) = item_id(&saved).or_else(|| item_id(&item)) {
                    self.store.item(&id).set(Some(saved.clone()));
                }
                if !options.silent {
                    let object_vars = vars(&[("object", self.schema.title())]);
                    let message = options.success_message.clone().unwrap_or_else(|| {
                        if creating {
                            self.ui.translate("Create {{object}} success", &object_vars)
                        } else {
                            self.ui.translate("Save {{object}} success", &object_vars)
                        }
                    });
                    self.ui.success(&message);
                }
                Ok(saved)
            }
            Err(err) => {
                error::report(&err);
                Err(err)
            }
        }
    }

    /// Delete an item, drop it from the selection and refresh the list once.
    /// Failure propagates without touching the selection.
    pub async fn delete_item(&self, id: &Id) -> Result<(), ModelError> {
        let loading = self.store.loading(ops::DELETE);
        loading.set(true);
        let result = self.adapter.delete(id).await;
        loading.set(false);
        if let Err(err) = result {
            error::report(&err);
            return Err(err);
        }

        self.store.select(id, false);
        let message = self.ui.translate(
            "Delete {{object}} success",
            &vars(&[("object", self.schema.title())]),
        );
        self.ui.success(&message);
        self.query(None).await?;
        Ok(())
    }

    /// Run a list query, optionally overriding the current query state.
    /// Pagination fields merge key-by-key; `wheres` replaces the whole map
    /// when supplied. The merged state becomes the new baseline only when a
    /// patch was given. On failure the list resets to its empty baseline.
    ///
    /// Overlapping calls are sequenced by a generation token: a call that has
    /// been superseded returns its result but writes nothing to the store,
    /// so a slow stale response can never clobber a newer one.
    pub async fn query(&self, patch: Option<QueryPatch>) -> Result<QueryPage, ModelError> {
        let patch = patch.unwrap_or_default();
        let option = patch.apply(&self.store.option.get());
        let wheres = patch
            .wheres
            .clone()
            .unwrap_or_else(|| self.store.wheres.get());

        let epoch = self.query_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let loading = self.store.loading(ops::ITEMS);
        loading.set(true);

        let result = self.adapter.query(&option, &wheres).await;

        if self.query_epoch.load(Ordering::SeqCst) != epoch {
            return result.map_err(|err| {
                error::report(&err);
                err
            });
        }

        match result {
            Ok(page) => {
                let _batch = self.store.batch();
                let mut ids = Vec::with_capacity(page.items.len());
                for item in &page.items {
                    if let Some(id) = item_id(item) {
                        self.store.item(&id).set(Some(item.clone()));
                        ids.push(id);
                    }
                }
                self.store.ids.set(ids);
                self.store.count.set(page.total);
                if patch.has_option() {
                    self.store.option.set(option);
                }
                if patch.wheres.is_some() {
                    self.store.wheres.set(wheres);
                }
                loading.set(false);
                Ok(page)
            }
            Err(err) => {
                error::report(&err);
                let _batch = self.store.batch();
                self.store.reset_list();
                loading.set(false);
                Err(err)
            }
        }
    }

    /// Memoized field render resolution, keyed by (entity, field).
    pub fn field_renderer(&self, field: &str) -> Option<FieldRenderer> {
        let key = format!("{}.{}", self.schema.name, field);
        if let Some(cached) = self.render_cache.read().get(&key) {
            return cached.clone();
        }
        let resolved = self
            .schema
            .property(field)
            .and_then(|property| resolve(&self.resolvers, property, field));
        self.render_cache
            .write()
            .insert(key, resolved.clone());
        resolved
    }

    // Navigation events dispatched to the hosting router.

    pub fn on_add(&self) {
        self.ui.navigate(NavTarget::Path("../add".to_string()));
    }

    pub fn on_edit(&self, id: &Id) {
        self.ui
            .navigate(NavTarget::Path(format!("../{}/edit", encode_id(id))));
    }

    pub fn on_back(&self) {
        self.ui.navigate(NavTarget::Back);
    }

    pub fn on_saved(&self) {
        self.ui.navigate(NavTarget::Back);
    }
}
