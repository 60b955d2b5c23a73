//! Relation panels: nested CRUD over a related entity scoped to one parent
//! record. Each open panel derives its own schema, owns an independent store
//! keyed `{entity}_{parent_id}`, and reuses the model runtime recursively.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::error::{ModelError, ValidationErrors};
use crate::logic::runtime::{Loaded, ModelRuntime, SaveOptions};
use crate::model::{
    item_id, Id, Item, ModelSchema, Permission, Predicate, QueryPatch, SchemaPatch, Wheres,
    FILTERS_KEY,
};
use crate::store::RestAdapter;
use crate::ui::UiBridge;

/// How a relation panel is scoped to its parent record.
#[derive(Clone, Default)]
pub struct ChildModelOptions {
    /// Field on the child entity referencing the parent id.
    pub ref_field: String,
    /// Replaces the injected `{ref_field: parent_id}` filter entirely.
    pub ref_filter: Option<Predicate>,
    /// Reference values shallow-merged into every submitted child item.
    pub ref_data: Option<Item>,
    /// Overrides the configured refresh delay after a save.
    pub refresh_timeout: Option<Duration>,
    /// Shallow schema overrides applied on top of the derived schema.
    pub patch: SchemaPatch,
}

impl ChildModelOptions {
    pub fn referencing(ref_field: impl Into<String>) -> Self {
        Self { ref_field: ref_field.into(), ..Self::default() }
    }
}

/// An open relation panel. Dropped when the panel closes, taking its store
/// and cached state with it.
pub struct ChildModel {
    runtime: ModelRuntime,
    parent_id: Id,
    ref_data: Option<Item>,
    refresh_timeout: Option<Duration>,
}

impl ChildModel {
    /// Derived schema for a relation panel: top-level edit is disabled but
    /// preserved as `child_edit`, and a scoped edit action is appended.
    /// Caller overrides are merged last, shallowly.
    pub fn derive_schema(base: &ModelSchema, options: &ChildModelOptions) -> ModelSchema {
        let base_permission = base.permission();
        let mut derived = base.clone();
        let mut actions = derived.row_actions();
        actions.push("child-edit".to_string());
        derived.item_actions = Some(actions);
        derived.permission = Some(Permission {
            edit: false,
            child_edit: base_permission.edit,
            ..base_permission
        });
        derived.patched(&options.patch)
    }

    /// Open a panel for the records related to `parent` and run the scoped
    /// initial query.
    pub async fn open(
        base: &ModelSchema,
        parent: &Item,
        options: ChildModelOptions,
        adapter: Arc<dyn RestAdapter>,
        ui: Arc<dyn UiBridge>,
        config: RuntimeConfig,
    ) -> Result<ChildModel, ModelError> {
        let parent_id = item_id(parent).ok_or_else(|| {
            ModelError::Validation(ValidationErrors::single("id", "parent item has no id"))
        })?;

        let schema = Arc::new(Self::derive_schema(base, &options));
        let key = format!("{}_{}", schema.name, parent_id);
        let refresh_timeout = options.refresh_timeout.or_else(|| {
            (config.refresh_timeout_ms > 0)
                .then(|| Duration::from_millis(config.refresh_timeout_ms))
        });
        let runtime = ModelRuntime::with_key(schema, adapter, ui, config, key);

        let filter = options.ref_filter.clone().unwrap_or_else(|| {
            Predicate::field(options.ref_field.clone(), Predicate::eq(parent_id.clone()))
        });
        let mut wheres = Wheres::new();
        wheres.insert(FILTERS_KEY.to_string(), filter);
        runtime
            .query(Some(QueryPatch { wheres: Some(wheres), ..QueryPatch::default() }))
            .await?;

        Ok(ChildModel {
            runtime,
            parent_id,
            ref_data: options.ref_data,
            refresh_timeout,
        })
    }

    pub fn runtime(&self) -> &ModelRuntime {
        &self.runtime
    }

    pub fn key(&self) -> &str {
        self.runtime.key()
    }

    pub fn parent_id(&self) -> &Id {
        &self.parent_id
    }

    pub fn can_add(&self) -> bool {
        self.runtime.schema().permission().add
    }

    /// Edit permission delegated from the base schema.
    pub fn can_child_edit(&self) -> bool {
        self.runtime.schema().permission().child_edit
    }

    /// Load the modal form item: the child record (or a default item for
    /// creation) with the reference values merged in.
    pub async fn load_form(&self, id: Option<&Id>) -> Result<Loaded, ModelError> {
        let mut loaded = self.runtime.load(id, None).await?;
        loaded.data = self.with_ref_data(loaded.data);
        Ok(loaded)
    }

    /// Submit the modal form: merge reference values, save, wait out the
    /// configured read-after-write delay, then refresh the panel list.
    pub async fn save_child(&self, values: Item, partial: bool) -> Result<Item, ModelError> {
        let merged = self.with_ref_data(values);
        let saved = self
            .runtime
            .save(merged, SaveOptions { partial, ..SaveOptions::default() })
            .await?;
        if let Some(delay) = self.refresh_timeout {
            tokio::time::sleep(delay).await;
        }
        self.runtime.query(None).await?;
        Ok(saved)
    }

    fn with_ref_data(&self, values: Item) -> Item {
        let mut merged = values;
        if let (Some(target), Some(Value::Object(refs))) =
            (merged.as_object_mut(), self.ref_data.as_ref())
        {
            for (key, value) in refs {
                target.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}
