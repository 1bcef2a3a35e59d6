//! Lazily-evaluated element locators
//!
//! A [`Locator`] is just a page handle plus a [`SelectorChain`]. Nothing is
//! cached: every call re-resolves the chain against the live DOM, walking the
//! chain in order and using the first selector that matches anything.

use std::fmt;
use std::time::{Duration, Instant};

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::error::{E2eError, E2eResult};
use crate::selector::SelectorChain;

/// Element states a wait can target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        };
        f.write_str(s)
    }
}

/// Snapshot of what a chain currently resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Probe {
    pub count: usize,
    pub first_visible: bool,
}

impl Probe {
    pub fn satisfies(&self, state: WaitState) -> bool {
        match state {
            WaitState::Visible => self.count > 0 && self.first_visible,
            WaitState::Hidden => self.count == 0 || !self.first_visible,
            WaitState::Attached => self.count > 0,
            WaitState::Detached => self.count == 0,
        }
    }
}

#[derive(Deserialize)]
struct FirstText {
    found: bool,
    text: String,
}

/// In-page helpers shared by every locator script.
///
/// `__resolve(root, chain)` returns the matches of the first selector in
/// `chain` that matches anything under `root`.
const RESOLVER_JS: &str = r#"
  const __norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const __visible = (el) => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
  };
  const __innermost = (root, pred) => {
    const skip = ['HEAD', 'SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'TITLE'];
    const all = [root, ...root.querySelectorAll('*')]
      .filter((el) => el.nodeType === 1 && !skip.includes(el.tagName) && !el.closest('head'));
    return all.filter((el) => pred(__norm(el.textContent)) &&
      !Array.from(el.children).some((child) => pred(__norm(child.textContent))));
  };
  const __one = (root, sel) => {
    switch (sel.kind) {
      case 'css':
        return Array.from(root.querySelectorAll(sel.css));
      case 'has_text': {
        const needle = sel.text.toLowerCase();
        return Array.from(root.querySelectorAll(sel.css))
          .filter((el) => __norm(el.textContent).toLowerCase().includes(needle));
      }
      case 'text': {
        const needle = __norm(sel.text).toLowerCase();
        return __innermost(root, (t) => t.toLowerCase().includes(needle));
      }
      case 'text_regex': {
        const re = new RegExp(sel.source, sel.flags);
        return __innermost(root, (t) => re.test(t));
      }
      case 'role':
        return Array.from(root.querySelectorAll('[role="' + sel.role + '"]'));
      default:
        return [];
    }
  };
  const __resolve = (root, chain) => {
    for (const sel of chain) {
      const found = __one(root, sel);
      if (found.length > 0) return found;
    }
    return [];
  };
"#;

/// Wrap `body` (which sees `els`, the resolved elements) in a self-contained
/// expression evaluated in the page.
pub(crate) fn script(chain: &SelectorChain, body: &str) -> E2eResult<String> {
    Ok(format!(
        "(() => {{\n{resolver}\n  const els = __resolve(document, {chain});\n{body}\n}})()",
        resolver = RESOLVER_JS,
        chain = chain.to_js()?,
        body = body,
    ))
}

/// Like [`script`], with each element of `els` mapped to the text of the
/// cells matched by `cells` inside it.
pub(crate) fn cells_script(rows: &SelectorChain, cells: &SelectorChain) -> E2eResult<String> {
    script(
        rows,
        &format!(
            "  const cellChain = {};\n  return els.map((row) => __resolve(row, cellChain).map((c) => c.textContent || ''));",
            cells.to_js()?
        ),
    )
}

/// A named element reference on a page
#[derive(Clone)]
pub struct Locator {
    page: Page,
    chain: SelectorChain,
    poll_interval: Duration,
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator").field("chain", &self.chain).finish()
    }
}

impl Locator {
    pub fn new(page: Page, chain: SelectorChain, poll_interval: Duration) -> Self {
        Self {
            page,
            chain,
            poll_interval,
        }
    }

    pub fn chain(&self) -> &SelectorChain {
        &self.chain
    }

    async fn eval<T: DeserializeOwned>(&self, body: &str) -> E2eResult<T> {
        let js = script(&self.chain, body)?;
        let value = self.page.evaluate(js).await?.into_value::<T>()?;
        Ok(value)
    }

    /// Current match count and visibility of the first match
    pub async fn probe(&self) -> E2eResult<Probe> {
        self.eval("  return { count: els.length, first_visible: els.length > 0 && __visible(els[0]) };")
            .await
    }

    pub async fn count(&self) -> E2eResult<usize> {
        Ok(self.probe().await?.count)
    }

    pub async fn is_visible(&self) -> E2eResult<bool> {
        Ok(self.probe().await?.first_visible)
    }

    /// Raw `textContent` of every match, in document order
    pub async fn all_text_contents(&self) -> E2eResult<Vec<String>> {
        self.eval("  return els.map((el) => el.textContent || '');").await
    }

    /// Raw `textContent` of the first match, `None` when nothing matches
    pub async fn text_content(&self) -> E2eResult<Option<String>> {
        // A bare `null` result carries no value over CDP, so tag it.
        let first: FirstText = self
            .eval("  return { found: els.length > 0, text: els.length > 0 ? (els[0].textContent || '') : '' };")
            .await?;
        Ok(first.found.then_some(first.text))
    }

    /// Poll until the chain reaches `state`
    pub async fn wait_for(&self, state: WaitState, timeout: Duration) -> E2eResult<()> {
        let start = Instant::now();
        loop {
            match self.probe().await {
                Ok(probe) if probe.satisfies(state) => {
                    trace!("{} is {} after {:?}", self.chain, state, start.elapsed());
                    return Ok(());
                }
                Ok(_) => {}
                // The execution context is torn down while a navigation is in flight.
                Err(e) => debug!("Probe of {} failed, retrying: {}", self.chain, e),
            }

            if start.elapsed() >= timeout {
                return Err(E2eError::Timeout(format!(
                    "{} to be {} ({} ms)",
                    self.chain,
                    state,
                    timeout.as_millis()
                )));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Wait until visible, then click the first match
    pub async fn click(&self, timeout: Duration) -> E2eResult<()> {
        self.wait_for(WaitState::Visible, timeout).await?;
        debug!("click {}", self.chain);

        let clicked: bool = self
            .eval(
                "  if (els.length === 0) return false;\n  els[0].scrollIntoView({ block: 'center', inline: 'center' });\n  els[0].click();\n  return true;",
            )
            .await?;
        if !clicked {
            return Err(E2eError::SelectorUnresolved(self.chain.to_string()));
        }
        Ok(())
    }

    /// Wait until visible, then replace the value of the first match.
    ///
    /// Goes through the native value setter so framework-controlled inputs
    /// see the change.
    pub async fn fill(&self, value: &str, timeout: Duration) -> E2eResult<()> {
        self.wait_for(WaitState::Visible, timeout).await?;
        debug!("fill {}", self.chain);

        let body = format!(
            r#"  if (els.length === 0) return false;
  const el = els[0];
  const value = {value};
  el.focus();
  const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const setter = Object.getOwnPropertyDescriptor(proto, 'value');
  if (setter && setter.set) {{ setter.set.call(el, value); }} else {{ el.value = value; }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;"#,
            value = serde_json::to_string(value)?,
        );

        let filled: bool = self.eval(&body).await?;
        if !filled {
            return Err(E2eError::SelectorUnresolved(self.chain.to_string()));
        }
        Ok(())
    }
}

/// Wait until any of `locators` becomes visible; returns the index that did.
pub async fn wait_for_any_visible(
    locators: &[Locator],
    timeout: Duration,
    poll_interval: Duration,
) -> E2eResult<usize> {
    let start = Instant::now();
    loop {
        for (i, locator) in locators.iter().enumerate() {
            match locator.probe().await {
                Ok(probe) if probe.satisfies(WaitState::Visible) => return Ok(i),
                Ok(_) => {}
                Err(e) => debug!("Probe of {} failed, retrying: {}", locator.chain, e),
            }
        }

        if start.elapsed() >= timeout {
            let names: Vec<String> = locators.iter().map(|l| l.chain.to_string()).collect();
            return Err(E2eError::Timeout(format!(
                "any of [{}] to be visible ({} ms)",
                names.join(" | "),
                timeout.as_millis()
            )));
        }
        sleep(poll_interval).await;
    }
}
