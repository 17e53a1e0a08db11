// File: ./src/client/mod.rs
pub mod auth;
pub mod core;
pub mod error;
pub mod middleware;
pub mod redirect;
pub mod transport;

pub use crate::client::core::{ApiClient, ApiClientBuilder, ApiResponse};
pub use crate::client::error::ApiError;
pub use crate::client::middleware::{Middleware, Next, ResponsePassThrough, StaticHeaders};
