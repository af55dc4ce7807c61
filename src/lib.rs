pub mod graph;
pub mod linker;
pub mod metric;
pub mod resolver;
pub mod search;
pub mod utils;
