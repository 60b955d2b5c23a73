use crate::model::{item_id, DataType, Item};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative description of one entity: fields, permissions and the layout
/// hints that drive auto-generated CRUD screens. Immutable once constructed
/// for a screen; relation panels build patched copies via [`ModelSchema::patched`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    pub name: String,
    /// Backend resource identifier, e.g. `users`.
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Field definitions in declaration order.
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
    /// Form field order.
    #[serde(default)]
    pub form: Vec<FormEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterZones>,
    /// Row actions; `None` means the default `edit`/`delete` pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_actions: Option<Vec<String>>,
    /// Fields excluded from inline editing in list context. `None` leaves
    /// every field editable; nested contexts force editability regardless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable_fields: Option<Vec<String>>,
    #[serde(default)]
    pub batch_change_fields: Vec<String>,
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
    /// Default list columns in display order.
    #[serde(default)]
    pub list_fields: Vec<String>,
    /// Template for newly created items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Force partial saves for every update of this entity.
    #[serde(default)]
    pub partial_save: bool,
    /// Property used to label an item in headers and notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
    /// Name of the related entity when this field references another model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relate_to: Option<String>,
    /// Nested property definitions for object/array fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_order: Option<bool>,
}

/// Permission flags for one entity. Absence of the whole object means no
/// operation is permitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub add: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default)]
    pub delete: bool,
    /// Edit permission delegated to relation panels; set when a panel narrows
    /// top-level `edit` away.
    #[serde(default)]
    pub child_edit: bool,
}

/// Entry in the form layout: a bare field name or a field with widget hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormEntry {
    Field(String),
    Spec {
        key: String,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        widget: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attrs: Option<Value>,
    },
}

impl FormEntry {
    pub fn key(&self) -> &str {
        match self {
            FormEntry::Field(key) => key,
            FormEntry::Spec { key, .. } => key,
        }
    }
}

/// Filter placement zones of the list screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterZones {
    #[serde(default)]
    pub nav: Vec<String>,
    #[serde(default)]
    pub submenu: Vec<String>,
    #[serde(default)]
    pub sidemenu: Vec<String>,
}

/// Shallow per-key overrides applied when deriving a schema for a relation
/// panel. `None` keeps the base value; `Some` replaces it wholesale.
#[derive(Debug, Clone, Default)]
pub struct SchemaPatch {
    pub title: Option<String>,
    pub permission: Option<Permission>,
    pub item_actions: Option<Vec<String>>,
    pub list_fields: Option<Vec<String>>,
    pub search_fields: Option<Vec<String>>,
    pub default_value: Option<Value>,
    pub partial_save: Option<bool>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
            title: None,
            properties: Vec::new(),
            permission: None,
            form: Vec::new(),
            filters: None,
            item_actions: None,
            editable_fields: None,
            batch_change_fields: Vec::new(),
            search_fields: Vec::new(),
            required: Vec::new(),
            readonly: Vec::new(),
            list_fields: Vec::new(),
            default_value: None,
            partial_save: false,
            display_field: None,
        }
    }

    /// Human-readable entity label.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    /// Effective permission flags; no permission object means all false.
    pub fn permission(&self) -> Permission {
        self.permission.unwrap_or_default()
    }

    /// Find a property by name, resolving dotted paths through nested
    /// object/array definitions.
    pub fn property(&self, field: &str) -> Option<&PropertyDef> {
        let mut segments = field.split('.');
        let first = segments.next()?;
        let mut current = self.properties.iter().find(|p| p.name == first)?;
        for segment in segments {
            current = current.properties.iter().find(|p| p.name == segment)?;
        }
        Some(current)
    }

    /// Row actions, defaulting to the standard pair when none are declared.
    pub fn row_actions(&self) -> Vec<String> {
        self.item_actions
            .clone()
            .unwrap_or_else(|| vec!["edit".to_string(), "delete".to_string()])
    }

    /// Label for one item: the display property when declared, else the id,
    /// else the entity title.
    pub fn display(&self, item: &Item) -> String {
        if let Some(field) = &self.display_field {
            if let Some(value) = item.get(field) {
                if let Some(s) = value.as_str() {
                    return s.to_string();
                }
                return value.to_string();
            }
        }
        item_id(item).unwrap_or_else(|| self.title().to_string())
    }

    /// Synthesize a default item from the schema template shallow-merged with
    /// preset values (preset wins per top-level key).
    pub fn default_item(&self, preset: Option<&Value>) -> Item {
        let mut map = serde_json::Map::new();
        if let Some(Value::Object(defaults)) = &self.default_value {
            for (k, v) in defaults {
                map.insert(k.clone(), v.clone());
            }
        }
        if let Some(Value::Object(preset)) = preset {
            for (k, v) in preset {
                map.insert(k.clone(), v.clone());
            }
        }
        Value::Object(map)
    }

    /// Apply shallow per-key overrides, producing a derived schema. Nested
    /// maps are replaced, never deep-merged.
    pub fn patched(&self, patch: &SchemaPatch) -> ModelSchema {
        let mut out = self.clone();
        if let Some(title) = &patch.title {
            out.title = Some(title.clone());
        }
        if let Some(permission) = patch.permission {
            out.permission = Some(permission);
        }
        if let Some(actions) = &patch.item_actions {
            out.item_actions = Some(actions.clone());
        }
        if let Some(list_fields) = &patch.list_fields {
            out.list_fields = list_fields.clone();
        }
        if let Some(search_fields) = &patch.search_fields {
            out.search_fields = search_fields.clone();
        }
        if let Some(default_value) = &patch.default_value {
            out.default_value = Some(default_value.clone());
        }
        if let Some(partial_save) = patch.partial_save {
            out.partial_save = partial_save;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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
                { "name": "address", "type": "object", "properties": [
                    { "name": "street", "type": "string" }
                ]}
            ],
            "permission": { "view": true, "add": true, "edit": true, "delete": true },
            "searchFields": ["name", "email"],
            "listFields": ["id", "name", "email"],
            "readonly": ["id"],
            "required": ["name", "email"]
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_camel_case_layout_fields() {
        let schema = user_schema();
        assert_eq!(schema.list_fields, vec!["id", "name", "email"]);
        assert_eq!(schema.search_fields, vec!["name", "email"]);
        assert!(schema.permission().edit);
    }

    #[test]
    fn property_resolves_dotted_paths() {
        let schema = user_schema();
        assert_eq!(schema.property("address.street").unwrap().name, "street");
        assert!(schema.property("address.zip").is_none());
        assert_eq!(schema.property("email").unwrap().format.as_deref(), Some("email"));
    }

    #[test]
    fn missing_permission_object_denies_everything() {
        let schema = ModelSchema::new("Post", "posts");
        let permission = schema.permission();
        assert!(!permission.view && !permission.add && !permission.edit && !permission.delete);
    }

    #[test]
    fn default_item_merges_preset_over_template() {
        let mut schema = ModelSchema::new("Post", "posts");
        schema.default_value = Some(json!({ "category": "Idea", "votes": 0 }));
        let item = schema.default_item(Some(&json!({ "category": "Question" })));
        assert_eq!(item, json!({ "category": "Question", "votes": 0 }));
    }

    #[test]
    fn patched_replaces_keys_shallowly() {
        let schema = user_schema();
        let derived = schema.patched(&SchemaPatch {
            permission: Some(Permission { edit: false, child_edit: true, view: true, add: true, delete: true }),
            ..SchemaPatch::default()
        });
        assert!(!derived.permission().edit);
        assert!(derived.permission().child_edit);
        // untouched keys keep base values
        assert_eq!(derived.list_fields, schema.list_fields);
    }
}
