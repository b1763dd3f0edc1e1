use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, NavigateParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{RenderingBackend, RenderingContext};
use crate::config::BrowserConfig;
use crate::js_templates;
use crate::timeouts::secs;
use crate::{Result, ScoutError};

/// Launches a fresh Chromium process per context.
#[derive(Debug, Default, Clone)]
pub struct ChromiumBackend;

impl ChromiumBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl RenderingBackend for ChromiumBackend {
    async fn open_context(&self, config: &BrowserConfig) -> Result<Box<dyn RenderingContext>> {
        let timeout = Duration::from_secs(config.launch_timeout_seconds);
        let context = tokio::time::timeout(timeout, ChromiumContext::launch(config))
            .await
            .map_err(|_| {
                ScoutError::ContextAcquisition(format!(
                    "browser did not start within {}s",
                    config.launch_timeout_seconds
                ))
            })??;
        Ok(Box::new(context))
    }
}

pub struct ChromiumContext {
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
    interceptor_task: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
    closed: bool,
}

impl ChromiumContext {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let chrome_path = match config.chrome_path.clone() {
            Some(path) => path,
            None => crate::utils::find_chrome_executable()?,
        };
        let profile_dir = std::env::temp_dir().join(format!("price-scout-{}", Uuid::new_v4()));

        let chromium_config = build_chromium_config(config, &chrome_path, &profile_dir)?;

        let (mut browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|e| ScoutError::ContextAcquisition(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await.ok();
                handler_task.abort();
                std::fs::remove_dir_all(&profile_dir).ok();
                return Err(ScoutError::ContextAcquisition(format!(
                    "failed to open page: {}",
                    e
                )));
            }
        };

        tracing::debug!(
            chrome = %chrome_path.display(),
            profile = %profile_dir.display(),
            headless = config.headless,
            "Chromium context launched"
        );

        let mut context = Self {
            browser,
            page,
            handler_task: Some(handler_task),
            interceptor_task: None,
            profile_dir,
            closed: false,
        };

        if let Err(e) = context.configure(config).await {
            context.close().await.ok();
            return Err(ScoutError::ContextAcquisition(format!(
                "failed to configure page: {}",
                e
            )));
        }

        Ok(context)
    }

    async fn configure(&mut self, config: &BrowserConfig) -> Result<()> {
        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(config.user_agent.clone())
            .accept_language("en-ZA,en;q=0.9")
            .build()
            .map_err(ScoutError::Protocol)?;
        self.page.set_user_agent(user_agent).await?;

        self.page
            .evaluate_on_new_document(
                AddScriptToEvaluateOnNewDocumentParams::builder()
                    .source(js_templates::HIDE_WEBDRIVER)
                    .build()
                    .map_err(ScoutError::Protocol)?,
            )
            .await?;

        if config.block_resources {
            self.block_resources(&config.blocked_resource_types).await?;
        }

        Ok(())
    }

    /// Fails matching requests before they leave the browser.
    async fn block_resources(&mut self, types: &[String]) -> Result<()> {
        let patterns: Vec<RequestPattern> = types
            .iter()
            .filter_map(|name| {
                let resource_type = parse_resource_type(name);
                if resource_type.is_none() {
                    tracing::warn!(resource_type = %name, "Unknown resource type, not blocking");
                }
                resource_type
            })
            .map(|resource_type| {
                RequestPattern::builder()
                    .url_pattern("*")
                    .resource_type(resource_type)
                    .request_stage(RequestStage::Request)
                    .build()
            })
            .collect();

        if patterns.is_empty() {
            return Ok(());
        }

        let mut paused = self.page.event_listener::<EventRequestPaused>().await?;
        let page = self.page.clone();
        self.interceptor_task = Some(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let params =
                    FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(err) = page.execute(params).await {
                    tracing::debug!(error = %err, url = %event.request.url, "Failed to block request");
                }
            }
        }));

        self.page
            .execute(EnableParams::builder().patterns(patterns).build())
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RenderingContext for ChromiumContext {
    async fn navigate(&self, url: &str) -> Result<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| ScoutError::Protocol(format!("Failed to build navigate params: {}", e)))?;

        let response = self.page.execute(params).await?;
        if let Some(error_text) = &response.result.error_text {
            return Err(ScoutError::Protocol(format!("Navigation failed: {}", error_text)));
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(task) = self.interceptor_task.take() {
            task.abort();
        }

        let close_timeout = Duration::from_secs(secs::CLOSE);
        match tokio::time::timeout(close_timeout, self.browser.close()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Failed to close browser gracefully, killing");
                self.browser.kill().await;
            }
            Err(_) => {
                tracing::warn!("Browser close timed out, killing");
                self.browser.kill().await;
            }
        }
        if tokio::time::timeout(close_timeout, self.browser.wait())
            .await
            .is_err()
        {
            tracing::warn!("Browser process did not exit in time");
        }

        if let Some(handle) = self.handler_task.take()
            && tokio::time::timeout(close_timeout, handle).await.is_err()
        {
            tracing::warn!("Browser handler did not stop in time");
        }

        if let Err(err) = tokio::fs::remove_dir_all(&self.profile_dir).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(error = %err, profile = %self.profile_dir.display(), "Failed to remove profile directory");
        }

        Ok(())
    }
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::warn!(profile = %self.profile_dir.display(), "Chromium context dropped without close");
        if let Some(task) = self.interceptor_task.take() {
            task.abort();
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        std::fs::remove_dir_all(&self.profile_dir).ok();
    }
}

fn build_chromium_config(
    config: &BrowserConfig,
    chrome_path: &std::path::Path,
    profile_dir: &std::path::Path,
) -> Result<ChromiumConfig> {
    let mut builder = ChromiumConfig::builder()
        .chrome_executable(chrome_path)
        .user_data_dir(profile_dir)
        .request_timeout(Duration::from_secs(secs::REQUEST))
        .window_size(config.window_width, config.window_height)
        .viewport(Viewport {
            width: config.window_width,
            height: config.window_height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: config.window_width >= config.window_height,
            has_touch: false,
        });

    if !config.headless {
        builder = builder.with_head();
    }
    if config.disable_sandbox {
        builder = builder.no_sandbox();
    }

    builder = builder.args(chromium_args(config));

    builder.build().map_err(ScoutError::ContextAcquisition)
}

fn chromium_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = vec![
        format!("--user-agent={}", config.user_agent),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--mute-audio".to_string(),
        "--lang=en-ZA".to_string(),
    ];
    if config.disable_gpu {
        args.push("--disable-gpu".to_string());
    }
    args.extend(config.extra_args.iter().cloned());
    args
}

fn parse_resource_type(name: &str) -> Option<ResourceType> {
    match name.to_ascii_lowercase().as_str() {
        "image" => Some(ResourceType::Image),
        "font" => Some(ResourceType::Font),
        "media" => Some(ResourceType::Media),
        "stylesheet" => Some(ResourceType::Stylesheet),
        _ => None,
    }
}
