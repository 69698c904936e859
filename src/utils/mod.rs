pub mod super_fast_hash;
pub mod tolerance;
pub mod validation;

pub use super_fast_hash::super_fast_hash;
pub use tolerance::*;
pub use validation::*;
