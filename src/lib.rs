pub mod config;
pub mod error;
pub mod fetch;
pub mod mapper;
pub mod models;
pub mod openapi;
pub mod registry;
pub mod repo;
pub mod request;
pub mod routes;
pub mod telemetry;
pub mod upstream;

// Re-export commonly used items for tests / external users
pub use fetch::{FetchQuery, FetchedImages, SourceFetcher};
pub use routes::{config, AppState};
