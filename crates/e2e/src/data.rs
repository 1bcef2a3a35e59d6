//! Static test data and the selector registry
//!
//! `TestData` is built once before any scenario runs and shared read-only
//! behind an `Arc`. Values come from the built-in defaults, optionally
//! overridden by a YAML file and then by `FIXA_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::E2eResult;
use crate::selector::{Selector, SelectorChain};

/// Everything a scenario may look up
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestData {
    pub credentials: Credentials,
    pub urls: Urls,
    pub expected: ExpectedData,
    pub pages: TestPages,
    pub selectors: SelectorRegistry,
}

impl TestData {
    /// Parse (possibly partial) test data from YAML
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse test data from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load `.env`, then the YAML file (`path` or `FIXA_TEST_DATA`), then env overrides.
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }

        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("FIXA_TEST_DATA").map(PathBuf::from));

        let mut data = match path {
            Some(path) => {
                info!("Loading test data from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        data.apply_env(|key| std::env::var(key).ok());
        Ok(data)
    }

    /// Apply `FIXA_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FIXA_EMAIL") {
            self.credentials.identifier = v;
        }
        if let Some(v) = lookup("FIXA_PASSWORD") {
            self.credentials.secret = v;
        }
        if let Some(v) = lookup("FIXA_BASE_URL") {
            self.urls.base = v;
        }
        if let Some(v) = lookup("FIXA_LOGIN_URL") {
            self.urls.login = v;
        }
        if let Some(v) = lookup("FIXA_EMPLOYEES_URL") {
            self.urls.employees = v;
        }
    }
}

/// Login credentials
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            identifier: "qa@fixa.local".to_string(),
            secret: "change-me".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Navigation targets on the application under test
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Urls {
    pub base: String,
    pub login: String,
    pub employees: String,
}

impl Default for Urls {
    fn default() -> Self {
        Self {
            base: "http://localhost:3000".to_string(),
            login: "/login".to_string(),
            employees: "/employees".to_string(),
        }
    }
}

impl Urls {
    /// Employees list path with pagination query. `page` is signed so
    /// out-of-range values can be requested on purpose.
    pub fn employees_page(&self, page: i64, per_page: u32) -> String {
        format!("{}?page={}&perPage={}", self.employees, page, per_page)
    }

    /// Resolve a path against the base URL; absolute URLs pass through.
    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Domain values the application is expected to show
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExpectedData {
    pub employee_types: Vec<String>,
    pub trades: Vec<String>,
    pub statuses: Vec<String>,
    pub expected_employee_count: u64,
}

impl Default for ExpectedData {
    fn default() -> Self {
        Self {
            employee_types: [
                "special",
                "casual(gross)",
                "permanent(net)",
                "permanent(gross)",
                "casual(contract-test)",
                "casual(net)",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            trades: vec!["Plumber".to_string()],
            statuses: vec!["active".to_string(), "inactive".to_string()],
            expected_employee_count: 474,
        }
    }
}

/// Pagination parameters exercised by the suite
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestPages {
    pub valid_pages: Vec<i64>,
    pub invalid_pages: Vec<i64>,
    pub per_page_values: Vec<u32>,
    pub default_page: i64,
    pub default_per_page: u32,
}

impl Default for TestPages {
    fn default() -> Self {
        Self {
            valid_pages: vec![1, 2, 3],
            invalid_pages: vec![999, -1, 0],
            per_page_values: vec![5, 10, 20, 50],
            default_page: 1,
            default_per_page: 10,
        }
    }
}

/// Selector chains keyed by logical element
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorRegistry {
    pub login: LoginSelectors,
    pub employees: EmployeesSelectors,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    pub username_input: SelectorChain,
    pub password_input: SelectorChain,
    pub submit_button: SelectorChain,

    /// Greeting shown after a successful login
    pub success_primary: SelectorChain,

    /// Any of these counts as logged in when the greeting never shows
    pub success_fallback: SelectorChain,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            username_input: SelectorChain::single(Selector::css(r#"input[type="text"]"#))
                .or(Selector::css(r#"input[name="username"]"#))
                .or(Selector::css(r#"input[placeholder*="Username"]"#))
                .or(Selector::css(r#"input[placeholder*="username"]"#)),
            password_input: SelectorChain::single(Selector::css(r#"input[type="password"]"#))
                .or(Selector::css(r#"input[name="password"]"#))
                .or(Selector::css(r#"input[placeholder*="Password"]"#))
                .or(Selector::css(r#"input[placeholder*="password"]"#)),
            submit_button: Selector::css(r#"button[type="submit"]"#).into(),
            success_primary: Selector::text("Good Evening").into(),
            success_fallback: SelectorChain::single(Selector::text("Dashboard"))
                .or(Selector::text("Employees"))
                .or(Selector::has_text("h1", "Dashboard")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmployeesSelectors {
    pub heading: SelectorChain,
    pub add_employee_button: SelectorChain,
    pub table: SelectorChain,
    pub rows: SelectorChain,

    /// Cells, resolved inside each row
    pub row_cells: SelectorChain,

    pub pagination_container: SelectorChain,
    pub next_page: SelectorChain,
    pub previous_page: SelectorChain,
    pub trade_filter: SelectorChain,
    pub employee_type_filter: SelectorChain,
    pub status_filter: SelectorChain,
    pub employee_count: SelectorChain,
    pub showing_text: SelectorChain,
    pub total_pages_text: SelectorChain,
    pub modal: SelectorChain,
    pub modal_heading: SelectorChain,
    pub modal_prompt: SelectorChain,
    pub modal_back_button: SelectorChain,
    pub body: SelectorChain,
}

impl Default for EmployeesSelectors {
    fn default() -> Self {
        Self {
            heading: Selector::has_text("h1", "Employees").into(),
            add_employee_button: Selector::has_text("button", "Add Employee").into(),
            table: SelectorChain::single(Selector::css("table"))
                .or(Selector::role("table"))
                .or(Selector::css(".table")),
            rows: SelectorChain::single(Selector::css("tbody tr")).or(Selector::role("row")),
            row_cells: SelectorChain::single(Selector::css("td")).or(Selector::role("gridcell")),
            pagination_container: SelectorChain::single(Selector::css(
                r#"[data-slot="pagination-link"]"#,
            ))
            .or(Selector::css(".pagination"))
            .or(Selector::css(".pager")),
            next_page: Selector::css(r#"a[aria-label="Go to next page"]"#).into(),
            previous_page: Selector::css(r#"a[aria-label="Go to previous page"]"#).into(),
            trade_filter: Selector::has_text("button", "Trade").into(),
            employee_type_filter: Selector::has_text("button", "Employee Type").into(),
            status_filter: Selector::has_text("button", "Status").into(),
            employee_count: Selector::text_regex(r"\d+\s+Employees").into(),
            showing_text: Selector::text_regex("Showing").into(),
            total_pages_text: Selector::text_regex(r"\d+\s*Previous").into(),
            modal: SelectorChain::single(Selector::role("dialog"))
                .or(Selector::css(".modal"))
                .or(Selector::css(".dialog")),
            modal_heading: Selector::has_text("h1", "Add Employees").into(),
            modal_prompt: Selector::text("Choose Employees Type").into(),
            modal_back_button: Selector::has_text("button", "Back").into(),
            body: Selector::css("body").into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn employees_page_keeps_signed_page_numbers() {
        let urls = Urls::default();
        assert_eq!(urls.employees_page(1, 10), "/employees?page=1&perPage=10");
        assert_eq!(urls.employees_page(-1, 10), "/employees?page=-1&perPage=10");
    }

    #[test]
    fn absolute_joins_without_double_slash() {
        let urls = Urls {
            base: "http://app.test:8080/".to_string(),
            ..Urls::default()
        };
        assert_eq!(urls.absolute("/login"), "http://app.test:8080/login");
        assert_eq!(urls.absolute("employees"), "http://app.test:8080/employees");
        assert_eq!(urls.absolute("https://other/x"), "https://other/x");
    }

    #[test]
    fn env_overrides_credentials_and_paths() {
        let vars: HashMap<&str, &str> = [
            ("FIXA_EMAIL", "ops@example.com"),
            ("FIXA_PASSWORD", "s3cret"),
            ("FIXA_EMPLOYEES_URL", "/staff"),
        ]
        .into_iter()
        .collect();
        let mut data = TestData::default();
        data.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(data.credentials.identifier, "ops@example.com");
        assert_eq!(data.credentials.secret, "s3cret");
        assert_eq!(data.urls.employees, "/staff");
        assert_eq!(data.urls.login, "/login");
    }

    #[test]
    fn debug_output_hides_secret() {
        let creds = Credentials {
            identifier: "a@b.c".to_string(),
            secret: "hunter2".to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(shown.contains("a@b.c"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn default_selectors_are_valid() {
        let s = SelectorRegistry::default();
        for chain in [
            &s.employees.employee_count,
            &s.employees.showing_text,
            &s.employees.total_pages_text,
        ] {
            for selector in chain.iter() {
                selector.validate().unwrap();
            }
        }
        assert_eq!(s.login.username_input.len(), 4);
        assert_eq!(s.employees.rows.len(), 2);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
urls:
  base: http://staging.fixa.test
selectors:
  employees:
    rows: "[data-testid=employee-row], tbody tr"
"#;
        let data = TestData::from_yaml(yaml).unwrap();
        assert_eq!(data.urls.base, "http://staging.fixa.test");
        assert_eq!(data.urls.login, "/login");
        assert_eq!(data.selectors.employees.rows.len(), 2);
        assert_eq!(
            data.selectors.employees.rows.selectors()[0],
            Selector::css("[data-testid=employee-row]")
        );
        assert_eq!(data.pages.per_page_values, vec![5, 10, 20, 50]);
    }

    #[test]
    fn login_fallback_markers_are_dashboard_specific() {
        let fallback = &LoginSelectors::default().success_fallback;
        assert!(!fallback.iter().any(|s| *s == Selector::css("h1")));
        assert_eq!(
            fallback.selectors().last(),
            Some(&Selector::has_text("h1", "Dashboard"))
        );
    }
}
