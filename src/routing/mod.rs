pub mod router;

pub use router::{RouteConfig, RouteKind, RouteTable, MAX_CACHE_TTL_SECONDS};
