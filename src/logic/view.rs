//! Derived view-state: pure functions over the store, recomputed on read so
//! they can never diverge from the base keys.

use itertools::Itertools;
use serde_json::Value;

use crate::error::ModelError;
use crate::logic::render::FieldRenderer;
use crate::logic::runtime::ModelRuntime;
use crate::model::{get_path, start_case, DataType, Id, Item, QueryPatch};
use crate::store::{ops, QueryPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_count: u64,
    pub active_page: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub can_add: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Debug, Clone)]
pub struct RowState {
    pub selected: bool,
    pub item: Option<Item>,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListView {
    pub loading: bool,
    pub fields: Vec<String>,
    pub rows: Vec<(Id, RowState)>,
}

#[derive(Debug, Clone)]
pub struct FieldState {
    pub value: Value,
    pub editable: bool,
    pub renderer: Option<FieldRenderer>,
}

impl ModelRuntime {
    pub fn pagination(&self) -> Pagination {
        let count = self.store().count.get();
        let option = self.store().option.get();
        let limit = option.limit.max(1);
        Pagination {
            page_count: count.div_ceil(limit),
            active_page: option.skip / limit + 1,
        }
    }

    /// Jump to a 1-based page and re-query.
    pub async fn change_page(&self, page: u64) -> Result<QueryPage, ModelError> {
        let limit = self.store().option.get().limit;
        let skip = limit * page.saturating_sub(1);
        self.query(Some(QueryPatch::skip(skip))).await
    }

    pub fn page_sizes(&self) -> &[u64] {
        &self.config().page_sizes
    }

    /// Change the page size, which always resets to the first page.
    pub async fn set_page_size(&self, size: u64) -> Result<QueryPage, ModelError> {
        self.query(Some(QueryPatch::page_size(size))).await
    }

    pub fn can_order(&self, field: &str) -> bool {
        match self.schema().property(field) {
            Some(property) => property
                .can_order
                .unwrap_or(!matches!(property.data_type, DataType::Object | DataType::Array)),
            None => false,
        }
    }

    /// Sort by a column and re-query.
    pub async fn change_order(&self, field: &str, descending: bool) -> Result<QueryPage, ModelError> {
        let sort = if descending {
            format!("-{}", field)
        } else {
            field.to_string()
        };
        self.query(Some(QueryPatch { sort: Some(sort), ..QueryPatch::default() }))
            .await
    }

    pub fn permissions(&self) -> Permissions {
        let permission = self.schema().permission();
        Permissions {
            can_add: permission.add,
            can_edit: permission.edit,
            can_delete: permission.delete,
        }
    }

    /// Column header: property title, else start-case of the field name.
    pub fn header(&self, field: &str) -> String {
        self.schema()
            .property(field)
            .and_then(|p| p.title.clone())
            .unwrap_or_else(|| start_case(field))
    }

    /// All selectable column names: list fields first, then remaining
    /// properties, in declaration order.
    pub fn all_fields(&self) -> Vec<String> {
        self.schema()
            .list_fields
            .iter()
            .chain(self.schema().properties.iter().map(|p| &p.name))
            .unique()
            .cloned()
            .collect()
    }

    /// Effective displayed columns: [`Self::all_fields`] restricted to the
    /// selected set, order preserved.
    pub fn visible_fields(&self) -> Vec<String> {
        let selected = self.store().fields.get();
        self.all_fields()
            .into_iter()
            .filter(|field| selected.iter().any(|s| s == field))
            .collect()
    }

    /// Toggle one column on or off.
    pub fn change_field_display(&self, field: &str, selected: bool) {
        let mut chosen = self.store().fields.get();
        if selected {
            if !chosen.iter().any(|f| f == field) {
                chosen.push(field.to_string());
            }
        } else {
            chosen.retain(|f| f != field);
        }
        let ordered: Vec<String> = self
            .all_fields()
            .into_iter()
            .filter(|f| chosen.iter().any(|c| c == f))
            .collect();
        self.store().fields.set(ordered);
    }

    pub fn row(&self, id: &Id) -> RowState {
        RowState {
            selected: self.store().is_selected(id),
            item: self.store().item(id).get(),
            actions: self.schema().row_actions(),
        }
    }

    pub fn list(&self) -> ListView {
        ListView {
            loading: self.store().loading(ops::ITEMS).get(),
            fields: self.visible_fields(),
            rows: self
                .store()
                .ids
                .get()
                .into_iter()
                .map(|id| {
                    let row = self.row(&id);
                    (id, row)
                })
                .collect(),
        }
    }

    pub fn select(&self, id: &Id, selected: bool) {
        self.store().select(id, selected);
    }

    pub fn select_all(&self, selected: bool) {
        self.store().select_all(selected);
    }

    pub fn all_selected(&self) -> bool {
        self.store().all_selected()
    }

    /// Field-level view of one item: value, editability and the memoized
    /// renderer. Nested contexts force editability.
    pub fn field_state(&self, field: &str, item: &Item, nested: bool) -> FieldState {
        let editable = nested
            || self
                .schema()
                .editable_fields
                .as_ref()
                .map(|fields| !fields.iter().any(|f| f == field))
                .unwrap_or(true);
        FieldState {
            value: get_path(item, field).cloned().unwrap_or(Value::Null),
            editable,
            renderer: self.field_renderer(field),
        }
    }
}
