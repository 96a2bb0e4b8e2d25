pub mod common;
pub mod generator;
pub mod plan;
pub mod profile;
pub mod template;

pub use common::*;
pub use generator::*;
pub use plan::*;
pub use profile::*;
pub use template::*;
