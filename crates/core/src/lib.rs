pub mod ids;
pub mod record;
pub mod validate;

pub use record::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
