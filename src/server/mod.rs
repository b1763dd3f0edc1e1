pub mod http;

pub use http::{ApiError, HttpServer};
