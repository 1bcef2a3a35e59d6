//! Authenticated browser sessions
//!
//! [`SessionFixture`] hands each scenario its own isolated, logged-in
//! browser context and always disposes of it when the scenario is done,
//! whether it passed, failed or panicked.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{BrowserHandle, IsolatedContext};
use crate::config::Timings;
use crate::data::TestData;
use crate::error::{E2eError, E2eResult};
use crate::locator::{wait_for_any_visible, Locator, WaitState};
use crate::selector::SelectorChain;

/// One isolated browser context, used by exactly one scenario
#[derive(Clone, Debug)]
pub struct Session {
    page: Page,
    context: Arc<Mutex<Option<IsolatedContext>>>,
    timings: Arc<Timings>,
}

impl Session {
    fn new(context: IsolatedContext, timings: Arc<Timings>) -> Self {
        Self {
            page: context.page().clone(),
            context: Arc::new(Mutex::new(Some(context))),
            timings,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn locator(&self, chain: SelectorChain) -> Locator {
        Locator::new(self.page.clone(), chain, self.timings.poll_interval())
    }

    /// Navigate and wait until the document is parsed (not fully loaded)
    pub async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("goto {}", url);
        self.page.goto(url).await?;
        self.wait_for_document_parsed().await
    }

    /// Reload the current page and wait for the document to be parsed
    pub async fn reload(&self) -> E2eResult<()> {
        debug!("reload");
        self.page.reload().await?;
        self.wait_for_document_parsed().await
    }

    /// Poll `document.readyState` until it leaves `loading`
    pub async fn wait_for_document_parsed(&self) -> E2eResult<()> {
        let timeout = Timings::ms(self.timings.document_ready_ms);
        let start = Instant::now();
        loop {
            match self.ready_state().await {
                Ok(state) if state != "loading" => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!("readyState check failed, retrying: {}", e),
            }
            if start.elapsed() >= timeout {
                return Err(E2eError::Timeout(format!(
                    "document to be parsed ({} ms)",
                    timeout.as_millis()
                )));
            }
            sleep(self.timings.poll_interval()).await;
        }
    }

    async fn ready_state(&self) -> E2eResult<String> {
        Ok(self
            .page
            .evaluate("document.readyState")
            .await?
            .into_value::<String>()?)
    }

    /// Current page URL, if any
    pub async fn url(&self) -> E2eResult<Option<String>> {
        Ok(self.page.url().await?)
    }

    /// Save a full-page PNG
    pub async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await?;
        info!("Screenshot saved to {}", path.display());
        Ok(())
    }

    /// Dispose of the browser context. Safe to call more than once.
    pub async fn close(&self) -> E2eResult<()> {
        let context = self.context.lock().await.take();
        match context {
            Some(context) => context.dispose().await,
            None => Ok(()),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.context.lock().await.is_none()
    }
}

/// Produces authenticated sessions with guaranteed teardown
pub struct SessionFixture<'a> {
    browser: &'a BrowserHandle,
    data: Arc<TestData>,
    timings: Arc<Timings>,
}

impl<'a> SessionFixture<'a> {
    pub fn new(browser: &'a BrowserHandle, data: Arc<TestData>, timings: Arc<Timings>) -> Self {
        Self {
            browser,
            data,
            timings,
        }
    }

    /// Open a fresh context and log in.
    ///
    /// The caller owns the returned session and must [`Session::close`] it;
    /// prefer [`SessionFixture::run`]. If login fails the context is closed
    /// before the error is returned.
    pub async fn acquire(&self) -> E2eResult<Session> {
        let context = self.browser.new_context().await?;
        let session = Session::new(context, Arc::clone(&self.timings));

        match self.login(&session).await {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!("Closing session after failed login: {}", close_err);
                }
                Err(E2eError::LoginFailed(Box::new(e)))
            }
        }
    }

    async fn login(&self, session: &Session) -> E2eResult<()> {
        let urls = &self.data.urls;
        let selectors = &self.data.selectors.login;
        let creds = &self.data.credentials;
        let t = &self.timings;
        let action = Timings::ms(t.action_ms);

        info!("Logging in as {}", creds.identifier);
        session.goto(&urls.absolute(&urls.login)).await?;

        session
            .locator(selectors.username_input.clone())
            .fill(&creds.identifier, action)
            .await?;
        session
            .locator(selectors.password_input.clone())
            .fill(&creds.secret, action)
            .await?;
        session
            .locator(selectors.submit_button.clone())
            .click(action)
            .await?;

        let primary = session.locator(selectors.success_primary.clone());
        match primary
            .wait_for(WaitState::Visible, Timings::ms(t.login_primary_ms))
            .await
        {
            Ok(()) => debug!("Login confirmed by {}", selectors.success_primary),
            Err(e) if e.is_timeout() => {
                warn!(
                    "{} not seen, falling back to [{}]",
                    selectors.success_primary, selectors.success_fallback
                );
                let fallbacks: Vec<Locator> = selectors
                    .success_fallback
                    .iter()
                    .map(|s| session.locator(SelectorChain::single(s.clone())))
                    .collect();
                let which = wait_for_any_visible(
                    &fallbacks,
                    Timings::ms(t.login_fallback_ms),
                    t.poll_interval(),
                )
                .await?;
                // A generic marker proves nothing while the login form is still up
                if let Some(url) = session.url().await? {
                    if still_on_login(&url, &urls.login) {
                        return Err(E2eError::Session(format!(
                            "{} matched but the page is still {}",
                            fallbacks[which].chain(),
                            url
                        )));
                    }
                }
                debug!("Login confirmed by {}", fallbacks[which].chain());
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Run `scope` with an authenticated session, closing it afterwards
    /// regardless of the outcome. A panic inside `scope` is reported as
    /// [`E2eError::ScenarioPanicked`] once the session is closed.
    pub async fn run<F, Fut, T>(&self, scope: F) -> E2eResult<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        let session = self.acquire().await?;
        let started = Instant::now();

        let outcome = AssertUnwindSafe(scope(session.clone())).catch_unwind().await;

        if let Err(e) = session.close().await {
            warn!("Session teardown failed: {}", e);
        }
        debug!("Session closed after {:?}", started.elapsed());

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(E2eError::ScenarioPanicked(panic_message(payload.as_ref()))),
        }
    }
}

/// Whether `current` still points at the login path (query and fragment ignored)
fn still_on_login(current: &str, login: &str) -> bool {
    let path = |url: &str| {
        url.split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string()
    };
    let login = path(login);
    !login.is_empty() && path(current).ends_with(&login)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Poll `check` until it returns true or `cap` elapses. Never fails on
/// timeout: the cap is the fixed settle delay used when no readiness signal
/// shows up. Returns whether the condition was observed.
pub async fn settle_until<F, Fut>(cap: Duration, poll_interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let start = Instant::now();
    loop {
        match check().await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => debug!("Settle check failed, retrying: {}", e),
        }
        if start.elapsed() >= cap {
            return false;
        }
        sleep(poll_interval.min(cap.saturating_sub(start.elapsed()))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn panic_payloads_become_messages() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(s.as_ref()), "boom");
        let s: Box<dyn Any + Send> = Box::new(String::from("row count was 0"));
        assert_eq!(panic_message(s.as_ref()), "row count was 0");
        let s: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "non-string panic payload");
    }

    #[test]
    fn login_path_detection_ignores_query_and_fragment() {
        assert!(still_on_login("http://localhost:3000/login", "/login"));
        assert!(still_on_login("http://localhost:3000/login/?next=%2F#top", "/login"));
        assert!(!still_on_login("http://localhost:3000/dashboard", "/login"));
        assert!(!still_on_login("http://localhost:3000/login-help", "/login"));
        // A root login path cannot be told apart from the app itself
        assert!(!still_on_login("http://localhost:3000/", "/"));
    }

    #[tokio::test]
    async fn settle_returns_early_once_condition_holds() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();
        let seen = settle_until(Duration::from_secs(5), Duration::from_millis(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        })
        .await;
        assert!(seen);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn settle_gives_up_after_cap_without_error() {
        let start = Instant::now();
        let seen = settle_until(Duration::from_millis(50), Duration::from_millis(10), || async {
            Err(E2eError::Timeout("never".into()))
        })
        .await;
        assert!(!seen);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
