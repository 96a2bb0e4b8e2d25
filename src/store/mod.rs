pub mod config_store;
pub mod document;
pub mod relationship_cache;
pub mod traits;

pub use config_store::*;
pub use document::*;
pub use relationship_cache::*;
pub use traits::*;
