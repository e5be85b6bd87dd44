pub mod balancer;

pub use balancer::{LoadBalancer, LoadBalancerStats, RoundRobinBalancer};
