pub mod pipeline;
pub mod polygon;
