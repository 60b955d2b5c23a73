pub mod http;
pub mod memory;
pub mod reactive;
pub mod traits;

pub use http::*;
pub use memory::*;
pub use reactive::*;
pub use traits::*;
