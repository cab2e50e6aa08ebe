pub mod artifacts;
pub mod constraints;
