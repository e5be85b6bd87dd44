pub mod aggregator;

pub use aggregator::{AggregationConfig, AggregationStrategy, Aggregator, SubCall};
