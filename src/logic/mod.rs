pub mod children;
pub mod predicate;
pub mod render;
pub mod runtime;
pub mod search;
pub mod view;

pub use children::{ChildModel, ChildModelOptions};
pub use render::{default_resolvers, FieldRenderResolver, FieldRenderer};
pub use runtime::{Loaded, ModelRuntime, SaveOptions};
pub use view::{FieldState, ListView, Pagination, Permissions, RowState};
