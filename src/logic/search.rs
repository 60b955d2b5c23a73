//! Free-text search over the schema's searchable fields, held under the
//! reserved `searchbar` filter key.

use crate::error::ModelError;
use crate::logic::runtime::ModelRuntime;
use crate::model::{start_case, Predicate, QueryPatch, SEARCHBAR_KEY};
use crate::store::QueryPage;

impl ModelRuntime {
    /// Apply a free-text search term. Builds one substring predicate per
    /// searchable field, OR-combined when there are several; an empty term
    /// removes the reserved key and leaves every other filter untouched.
    /// Always resets to the first page and re-queries.
    pub async fn search(&self, term: &str) -> Result<QueryPage, ModelError> {
        let mut wheres = self.store().wheres.get();
        let mut predicates: Vec<Predicate> = if term.is_empty() {
            Vec::new()
        } else {
            self.schema()
                .search_fields
                .iter()
                .map(|field| Predicate::field(field.clone(), Predicate::like(term)))
                .collect()
        };
        match predicates.len() {
            0 => {
                wheres.remove(SEARCHBAR_KEY);
            }
            1 => {
                wheres.insert(SEARCHBAR_KEY.to_string(), predicates.remove(0));
            }
            _ => {
                wheres.insert(SEARCHBAR_KEY.to_string(), Predicate::Or { or: predicates });
            }
        }
        self.query(Some(QueryPatch {
            skip: Some(0),
            wheres: Some(wheres),
            ..QueryPatch::default()
        }))
        .await
    }

    /// Searchable field names declared by the schema.
    pub fn search_fields(&self) -> &[String] {
        &self.schema().search_fields
    }

    /// Display titles for the searchable fields, for placeholder text.
    pub fn search_titles(&self) -> Vec<String> {
        self.schema()
            .search_fields
            .iter()
            .map(|field| {
                self.schema()
                    .property(field)
                    .and_then(|p| p.title.clone())
                    .unwrap_or_else(|| start_case(field))
            })
            .collect()
    }
}
