pub mod face;
pub mod gpu;
