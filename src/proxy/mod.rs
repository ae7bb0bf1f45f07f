pub mod headers;
pub mod request_builder;
pub mod service;

pub use service::{into_axum_router, Router};
