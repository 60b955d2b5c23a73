//! Schema-driven admin model runtime.
//!
//! Declarative entity schemas drive auto-generated CRUD state: a keyed
//! reactive store holds item caches, paginated lists, filters and selection;
//! the model runtime composes them over a REST data-access contract and
//! exposes plain view-state and actions to whatever renders the screen.

pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;
pub mod ui;

pub use config::{init_logging, RuntimeConfig};
pub use error::{set_error_sink, ModelError, ValidationErrors};
pub use logic::{
    ChildModel, ChildModelOptions, FieldRenderResolver, FieldRenderer, FieldState, ListView,
    Loaded, ModelRuntime, Pagination, Permissions, RowState, SaveOptions,
};
pub use model::*;
pub use store::{
    ops, HttpAdapter, MemoryAdapter, ModelStore, QueryPage, RestAdapter, StateCell, Subscription,
};
pub use ui::{NavTarget, NullBridge, UiBridge};
