//! Platform transport: REST/GraphQL client and pagination.

mod client;
mod paginate;

pub use client::{ApiResponse, RestClient};
pub use paginate::paginate;
