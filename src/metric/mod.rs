pub mod analysis;
pub mod base;
pub mod composite;

pub use base::{distance, BaseMetric};
pub use composite::{Aggregation, CompositeMetric, FnMetric, IdentityMetric, Metric};
