pub mod consumption;
pub mod meter;

pub use consumption::*;
pub use meter::*;
