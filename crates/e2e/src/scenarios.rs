//! Employees screen scenarios
//!
//! Every scenario receives an [`EmployeesPage`] bound to its own
//! authenticated session, already navigated to the first page of the list.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::config::Timings;
use crate::employees::EmployeesPage;
use crate::ensure_that;
use crate::error::{E2eError, E2eResult};
use crate::expect::{to_be_hidden, to_be_visible};

pub type ScenarioFuture = BoxFuture<'static, E2eResult<()>>;
pub type ScenarioFn = fn(EmployeesPage) -> ScenarioFuture;

/// A named, tagged test case
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub id: &'static str,
    pub name: &'static str,
    pub tags: &'static [&'static str],
    pub run: ScenarioFn,
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Match by id (`TC-EMP-002`) or name (`pagination`)
    pub fn matches(&self, query: &str) -> bool {
        self.id.eq_ignore_ascii_case(query) || self.name.eq_ignore_ascii_case(query)
    }
}

/// The full suite, in declaration order
pub fn all() -> Vec<Scenario> {
    vec![
        Scenario {
            id: "TC-EMP-001",
            name: "list-rendering",
            tags: &["smoke", "list"],
            run: list_rendering,
        },
        Scenario {
            id: "TC-EMP-002",
            name: "pagination",
            tags: &["pagination"],
            run: pagination,
        },
        Scenario {
            id: "TC-EMP-003",
            name: "add-employee-modal",
            tags: &["smoke", "modal"],
            run: add_employee_modal,
        },
        Scenario {
            id: "TC-EMP-004",
            name: "filters",
            tags: &["filters"],
            run: filters,
        },
        Scenario {
            id: "TC-EMP-005",
            name: "invalid-page-parameters",
            tags: &["pagination", "failure"],
            run: invalid_page_parameters,
        },
        Scenario {
            id: "TC-EMP-006",
            name: "per-page-bounds",
            tags: &["pagination"],
            run: per_page_bounds,
        },
        Scenario {
            id: "TC-EMP-007",
            name: "refresh-stability",
            tags: &["smoke"],
            run: refresh_stability,
        },
        Scenario {
            id: "TC-EMP-008",
            name: "row-data-shape",
            tags: &["list"],
            run: row_data_shape,
        },
        Scenario {
            id: "TC-EMP-009",
            name: "add-employee-modal-back",
            tags: &["modal"],
            run: add_employee_modal_back,
        },
    ]
}

/// Rendered rows may never exceed the requested page size
pub fn check_page_size(rows: usize, per_page: u32) -> E2eResult<()> {
    ensure_that!(
        rows <= per_page as usize,
        "perPage={} rendered {} rows",
        per_page,
        rows
    );
    Ok(())
}

/// A larger page size never renders fewer rows than a smaller one
pub fn check_monotonic(samples: &[(u32, usize)]) -> E2eResult<()> {
    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|(per_page, _)| *per_page);
    for pair in sorted.windows(2) {
        let (small, small_rows) = pair[0];
        let (large, large_rows) = pair[1];
        ensure_that!(
            large_rows >= small_rows,
            "perPage={} rendered {} rows but perPage={} rendered {}",
            large,
            large_rows,
            small,
            small_rows
        );
    }
    Ok(())
}

fn expect_timeout(page: &EmployeesPage) -> Duration {
    Timings::ms(page.session().timings().expect_ms)
}

async fn expect_rows(page: &EmployeesPage, context: &str) -> E2eResult<usize> {
    let rows = page.row_count().await?;
    ensure_that!(rows > 0, "expected employee rows {}, got none", context);
    Ok(rows)
}

fn list_rendering(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let timeout = expect_timeout(&page);
        page.wait_for_employee_data().await?;

        to_be_visible(&page.heading(), "Employees heading", timeout).await?;
        to_be_visible(&page.add_employee_button(), "Add Employee button", timeout).await?;
        to_be_visible(&page.table(), "employee table", timeout).await?;

        let rows = expect_rows(&page, "on first load").await?;
        let first = page.first_cell_text().await?.unwrap_or_default();
        ensure_that!(
            !first.is_empty(),
            "first cell of the first row is empty ({} rows)",
            rows
        );
        Ok(())
    })
}

fn pagination(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let timeout = expect_timeout(&page);
        expect_rows(&page, "on first load").await?;
        to_be_visible(&page.pagination_container(), "pagination controls", timeout).await?;
        let first_before = page.first_cell_text().await?;

        page.click_next_page().await?;
        expect_rows(&page, "after next page").await?;
        let first_after = page.first_cell_text().await?;
        debug!("First row {:?} -> {:?}", first_before, first_after);

        // Only the leading cell is compared; identical names on both pages
        // would read as "no change".
        ensure_that!(
            first_before != first_after,
            "next page still starts with {:?}",
            first_after
        );

        page.click_previous_page().await?;
        expect_rows(&page, "after previous page").await?;

        let pages = page.data().pages.clone();
        for valid in &pages.valid_pages {
            page.navigate_to(*valid, pages.default_per_page).await?;
            expect_rows(&page, &format!("on page={}", valid)).await?;
        }
        Ok(())
    })
}

fn add_employee_modal(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let timeout = expect_timeout(&page);
        to_be_visible(&page.add_employee_button(), "Add Employee button", timeout).await?;

        page.click_add_employee().await?;

        to_be_visible(&page.modal_heading(), "\"Add Employees\" heading", timeout).await?;
        to_be_visible(&page.modal_prompt(), "\"Choose Employees Type\" prompt", timeout).await?;
        Ok(())
    })
}

fn filters(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let timeout = expect_timeout(&page);
        expect_rows(&page, "before filtering").await?;

        page.click_trade_filter().await?;
        expect_rows(&page, "after the Trade filter").await?;
        to_be_visible(&page.table(), "employee table", timeout).await?;

        page.click_employee_type_filter().await?;
        expect_rows(&page, "after the Employee Type filter").await?;
        to_be_visible(&page.table(), "employee table", timeout).await?;

        page.click_status_filter().await?;
        expect_rows(&page, "after the Status filter").await?;
        to_be_visible(&page.table(), "employee table", timeout).await?;
        Ok(())
    })
}

fn invalid_page_parameters(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let timeout = expect_timeout(&page);
        let pages = page.data().pages.clone();

        for invalid in &pages.invalid_pages {
            info!("Requesting out-of-range page {}", invalid);
            page.navigate_to(*invalid, pages.default_per_page).await?;

            let context = format!("page body for page={}", invalid);
            to_be_visible(&page.body(), &context, timeout).await?;
            let context = format!("Add Employee button for page={}", invalid);
            to_be_visible(&page.add_employee_button(), &context, timeout).await?;
        }

        page.navigate_to(pages.default_page, pages.default_per_page)
            .await?;
        expect_rows(&page, "after recovering to a valid page").await?;
        Ok(())
    })
}

fn per_page_bounds(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let default_page = page.data().pages.default_page;
        let mut per_page_values = page.data().pages.per_page_values.clone();
        per_page_values.sort_unstable();
        per_page_values.dedup();
        if per_page_values.is_empty() {
            return Err(E2eError::Config("no perPage values configured".to_string()));
        }

        let mut samples = Vec::with_capacity(per_page_values.len());
        for per_page in per_page_values {
            page.navigate_to(default_page, per_page).await?;
            let rows = page.row_count().await?;
            info!("perPage={} rendered {} rows", per_page, rows);
            check_page_size(rows, per_page)?;
            samples.push((per_page, rows));
        }
        check_monotonic(&samples)
    })
}

fn refresh_stability(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let timeout = expect_timeout(&page);
        expect_rows(&page, "before reload").await?;

        page.reload().await?;

        expect_rows(&page, "after reload").await?;
        to_be_visible(&page.add_employee_button(), "Add Employee button", timeout).await?;
        to_be_visible(&page.table(), "employee table", timeout).await?;
        Ok(())
    })
}

fn row_data_shape(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let rendered = expect_rows(&page, "on first load").await?;
        let employees = page.employee_data().await?;

        ensure_that!(
            !employees.is_empty() && employees.len() <= rendered,
            "read {} rows from {} rendered",
            employees.len(),
            rendered
        );
        if let Some((i, _)) = employees.iter().enumerate().find(|(_, e)| e.name.is_empty()) {
            return Err(E2eError::AssertionFailed(format!(
                "row {} has an empty name cell",
                i + 1
            )));
        }

        let total = page.employee_count().await?;
        debug!("{} rows on page, {} employees reported", employees.len(), total);
        Ok(())
    })
}

fn add_employee_modal_back(page: EmployeesPage) -> ScenarioFuture {
    Box::pin(async move {
        let timeout = expect_timeout(&page);
        page.click_add_employee().await?;
        to_be_visible(&page.modal_heading(), "\"Add Employees\" heading", timeout).await?;

        page.close_add_employee_modal().await?;
        to_be_hidden(&page.modal_heading(), "\"Add Employees\" heading", timeout).await?;

        to_be_visible(&page.table(), "employee table", timeout).await?;
        expect_rows(&page, "after closing the modal").await?;
        Ok(())
    })
}
