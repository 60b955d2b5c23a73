//! Field render resolution: an ordered chain of resolvers maps a property
//! descriptor to the widget identifier the rendering surface should use.
//! The first resolver to produce a renderer wins; results are memoized per
//! (entity, field) key by the runtime.

use std::sync::Arc;

use crate::model::{DataType, PropertyDef};

/// Opaque widget identifier consumed by the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRenderer(pub String);

impl FieldRenderer {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// One link in the resolver chain; returns `None` to pass through.
pub type FieldRenderResolver =
    Arc<dyn Fn(&PropertyDef, &str) -> Option<FieldRenderer> + Send + Sync>;

/// Built-in chain: relations, enumerations and formats take precedence over
/// plain type mapping; the final resolver always matches.
pub fn default_resolvers() -> Vec<FieldRenderResolver> {
    vec![
        Arc::new(|property, _field| {
            property
                .relate_to
                .is_some()
                .then(|| FieldRenderer::named("relate"))
        }),
        Arc::new(|property, _field| {
            property
                .choices
                .is_some()
                .then(|| FieldRenderer::named("select"))
        }),
        Arc::new(|property, _field| match property.format.as_deref() {
            Some("date") => Some(FieldRenderer::named("date")),
            Some("date-time") => Some(FieldRenderer::named("datetime")),
            Some("email") => Some(FieldRenderer::named("email")),
            _ => None,
        }),
        Arc::new(|property, _field| match property.data_type {
            DataType::Boolean => Some(FieldRenderer::named("checkbox")),
            DataType::Object => Some(FieldRenderer::named("object")),
            DataType::Array => Some(FieldRenderer::named("array")),
            _ => None,
        }),
        Arc::new(|_property, _field| Some(FieldRenderer::named("text"))),
    ]
}

/// Run the chain with early exit on first match.
pub fn resolve(
    resolvers: &[FieldRenderResolver],
    property: &PropertyDef,
    field: &str,
) -> Option<FieldRenderer> {
    resolvers.iter().find_map(|resolver| resolver(property, field))
}
