pub mod loader;
pub mod profiler;
pub mod registry;
pub mod table;
