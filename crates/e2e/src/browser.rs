//! Chromium lifecycle over the DevTools protocol

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserSettings;
use crate::error::{E2eError, E2eResult};

/// A launched browser shared by every scenario in a run
pub struct BrowserHandle {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl BrowserHandle {
    /// Launch Chromium and start pumping its CDP event loop
    pub async fn launch(settings: &BrowserSettings) -> E2eResult<Self> {
        let config = Self::build_config(settings)?;

        info!(
            "Launching Chromium (headless: {}, viewport: {}x{})",
            settings.headless, settings.viewport_width, settings.viewport_height
        );

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
            debug!("CDP handler finished");
        });

        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }

    fn build_config(settings: &BrowserSettings) -> E2eResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .request_timeout(Duration::from_millis(settings.request_timeout_ms));

        if !settings.headless {
            builder = builder.with_head();
        }
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &settings.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(E2eError::BrowserLaunch)
    }

    /// Create an isolated browser context with one blank page in it
    pub async fn new_context(&self) -> E2eResult<IsolatedContext> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(E2eError::Session)?;

        let page = match self.browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                let _ = self
                    .browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await;
                return Err(e.into());
            }
        };

        debug!("Opened browser context {:?}", context_id);
        Ok(IsolatedContext {
            browser: Arc::clone(&self.browser),
            context_id,
            page,
        })
    }

    /// Close the browser. Outstanding contexts must already be released.
    pub async fn close(self) -> E2eResult<()> {
        let BrowserHandle { browser, handler } = self;

        match Arc::try_unwrap(browser) {
            Ok(mut browser) => {
                info!("Closing browser");
                if let Err(e) = browser.close().await {
                    warn!("Browser close failed: {}", e);
                }
                let _ = browser.wait().await;
            }
            Err(_) => warn!("Browser still referenced by open sessions; leaving it to drop"),
        }

        handler.abort();
        Ok(())
    }
}

/// A browser context owned by exactly one session
#[derive(Debug)]
pub struct IsolatedContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
}

impl IsolatedContext {
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Close the page and dispose of the context
    pub async fn dispose(self) -> E2eResult<()> {
        let IsolatedContext {
            browser,
            context_id,
            page,
        } = self;

        if let Err(e) = page.close().await {
            debug!("Page close failed (context is disposed anyway): {}", e);
        }
        browser
            .execute(DisposeBrowserContextParams::new(context_id.clone()))
            .await?;
        debug!("Disposed browser context {:?}", context_id);
        Ok(())
    }
}
