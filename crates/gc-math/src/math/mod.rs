//! Core math modules.

pub mod interp;
pub mod significance;
pub mod smooth;
pub mod spectrum;
