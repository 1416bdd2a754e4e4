//! gamma_cuts math utilities.

pub mod math;

pub use math::interp::*;
pub use math::significance::*;
pub use math::smooth::*;
pub use math::spectrum::*;
