pub mod app;
pub mod auth;
pub mod authz;
pub mod db;
pub mod docs;
pub mod errors;
pub mod models;
pub mod role_store;
pub mod routes;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{create_app, AppConfig};
