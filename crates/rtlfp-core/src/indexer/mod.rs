pub mod annotator;
pub mod builder;
pub mod frontend;
pub mod width;
