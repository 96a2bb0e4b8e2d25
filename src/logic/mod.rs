pub mod capability;
pub mod factory;
pub mod generators;
pub mod selection;
pub mod synthesize;
pub mod validate_payload;

pub use capability::*;
pub use factory::*;
pub use generators::*;
pub use selection::*;
pub use synthesize::*;
pub use validate_payload::*;
