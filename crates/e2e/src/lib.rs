//! Fixa Employees screen E2E harness
//!
//! This crate drives a real Chromium over the DevTools protocol against a
//! running Fixa instance and checks the Employees screen:
//! - Logs in once per scenario in an isolated browser context
//! - Wraps the screen in a page object with lazily-evaluated locators
//! - Resolves every element through ordered selector fallback chains
//! - Runs independent scenarios, optionally several at a time
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── wait_for_app(base_url)                               │
//! │    ├── BrowserHandle::launch() -> shared Chromium           │
//! │    └── per scenario:                                        │
//! │          SessionFixture::run(|session| ...)                 │
//! │            ├── new browser context + login                  │
//! │            ├── EmployeesPage::new(session).navigate()       │
//! │            ├── scenario assertions                          │
//! │            └── context disposed (always)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestData (defaults ← YAML ← FIXA_* env)                    │
//! │    ├── credentials, urls, expected values, pages            │
//! │    └── selectors: logical name -> SelectorChain             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod browser;
pub mod config;
pub mod data;
pub mod employees;
pub mod error;
pub mod expect;
pub mod locator;
pub mod runner;
pub mod scenarios;
pub mod selector;
pub mod session;

pub use config::HarnessConfig;
pub use data::TestData;
pub use employees::{EmployeeRow, EmployeesPage};
pub use error::{E2eError, E2eResult};
pub use runner::{Selection, TestRunner};
pub use selector::{Selector, SelectorChain};
pub use session::{Session, SessionFixture};
