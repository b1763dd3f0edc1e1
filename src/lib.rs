pub mod chrome;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extraction;
pub mod handlers;
pub mod js_templates;
pub mod lifecycle;
pub mod models;
pub mod ocr;
pub mod output;
pub mod server;
pub mod stats;
pub mod timeouts;
pub mod utils;

pub use config::Config;
pub use coordinator::RequestCoordinator;
pub use error::ScoutError;

pub type Result<T> = std::result::Result<T, ScoutError>;
