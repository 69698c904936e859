pub mod found_offset;
pub mod record;
pub mod transform;
pub mod transform_set;

pub use found_offset::*;
pub use record::*;
pub use transform::*;
pub use transform_set::*;
