pub mod engine;
pub mod guards;
pub mod planner;
