pub mod exporter;
pub mod loader;
pub mod synthetic;

pub use exporter::*;
pub use loader::*;
pub use synthetic::*;
