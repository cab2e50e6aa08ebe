pub mod dump;
pub mod graph;
