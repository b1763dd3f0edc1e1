pub mod launcher;
pub mod page_session;

use crate::Result;
use crate::config::BrowserConfig;

pub use launcher::{ChromiumBackend, ChromiumContext};
pub use page_session::{PageGeometry, PageSession, ScrollReport};

/// Starts isolated rendering contexts. One context serves exactly one request.
#[async_trait::async_trait]
pub trait RenderingBackend: Send + Sync {
    async fn open_context(&self, config: &BrowserConfig) -> Result<Box<dyn RenderingContext>>;
}

/// A single page in its own browser context.
#[async_trait::async_trait]
pub trait RenderingContext: Send + Sync {
    /// Issues the navigation command; returns once the navigation is committed.
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Current serialized DOM.
    async fn content(&self) -> Result<String>;

    /// PNG of the full scrollable page.
    async fn screenshot_full_page(&self) -> Result<Vec<u8>>;

    /// Releases the context. Further calls are no-ops.
    async fn close(&mut self) -> Result<()>;
}
