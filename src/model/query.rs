use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reserved filter key owned exclusively by the free-text search hook.
pub const SEARCHBAR_KEY: &str = "searchbar";

/// Reserved filter key used for filters injected by relation panels.
pub const FILTERS_KEY: &str = "filters";

fn default_limit() -> u64 {
    15
}

/// Pagination and ordering window for a list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOption {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Sort field; a `-` prefix means descending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

impl Default for QueryOption {
    fn default() -> Self {
        Self { skip: 0, limit: default_limit(), sort: None }
    }
}

impl QueryOption {
    pub fn with_limit(limit: u64) -> Self {
        Self { limit, ..Self::default() }
    }
}

/// Filter condition stored under a filter key.
///
/// Deserialized untagged, so variant order matters: `Like` and `Or` carry a
/// distinguishing field and must be tried before `Fields`, which matches any
/// JSON object; `Eq` is the catch-all for bare values. An equality test
/// against an object-valued field therefore parses as `Fields` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predicate {
    /// Substring match: `{ "like": "bob" }`.
    Like { like: String },
    /// Disjunction of predicates: `{ "or": [ ... ] }`.
    Or { or: Vec<Predicate> },
    /// Field-scoped predicates: `{ "name": { "like": "bob" } }`.
    Fields(BTreeMap<String, Predicate>),
    /// Direct equality against the filter key's field.
    Eq(Value),
}

impl Predicate {
    pub fn like(term: impl Into<String>) -> Self {
        Predicate::Like { like: term.into() }
    }

    pub fn eq(value: impl Into<Value>) -> Self {
        Predicate::Eq(value.into())
    }

    pub fn field(name: impl Into<String>, predicate: Predicate) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.into(), predicate);
        Predicate::Fields(fields)
    }
}

/// Active filters: filter key → predicate. Plain filter keys name the field
/// they constrain; the reserved keys carry structured predicates.
pub type Wheres = BTreeMap<String, Predicate>;

/// Partial override merged over the current query state. Pagination fields
/// merge key-by-key; `wheres` replaces the whole map when supplied, which is
/// how callers remove filter keys.
#[derive(Debug, Clone, Default)]
pub struct QueryPatch {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<String>,
    pub wheres: Option<Wheres>,
}

impl QueryPatch {
    pub fn skip(skip: u64) -> Self {
        Self { skip: Some(skip), ..Self::default() }
    }

    pub fn page_size(limit: u64) -> Self {
        Self { limit: Some(limit), skip: Some(0), ..Self::default() }
    }

    /// Whether any pagination/ordering field is overridden. Controls whether
    /// the merged option is persisted as the new baseline.
    pub fn has_option(&self) -> bool {
        self.skip.is_some() || self.limit.is_some() || self.sort.is_some()
    }

    pub fn apply(&self, base: &QueryOption) -> QueryOption {
        QueryOption {
            skip: self.skip.unwrap_or(base.skip),
            limit: self.limit.unwrap_or(base.limit),
            sort: self.sort.clone().or_else(|| base.sort.clone()),
        }
    }
}
