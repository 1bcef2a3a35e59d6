//! Page object for the Employees screen

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::data::{EmployeesSelectors, TestData};
use crate::error::E2eResult;
use crate::locator::{cells_script, Locator, WaitState};
use crate::selector::SelectorChain;
use crate::session::{settle_until, Session};

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)").expect("static regex compiles"));

/// First integer in `text`, or `default` when there is none (or it overflows)
pub fn extract_number(text: Option<&str>, default: u64) -> u64 {
    text.and_then(|t| FIRST_NUMBER.captures(t))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(default)
}

/// One table row as rendered, cells read positionally
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRow {
    pub name: String,
    pub system_id: String,
    pub employee_id: String,
    pub employee_type: String,
    pub phone_number: String,
    pub trade: String,
    pub status: String,
}

impl EmployeeRow {
    /// Build a row from raw cell texts. Missing cells become `""`, all values
    /// are trimmed, a row without cells yields `None`.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        if cells.is_empty() {
            return None;
        }
        let cell = |i: usize| {
            cells
                .get(i)
                .map(|c| c.as_ref().trim().to_string())
                .unwrap_or_default()
        };
        Some(Self {
            name: cell(0),
            system_id: cell(1),
            employee_id: cell(2),
            employee_type: cell(3),
            phone_number: cell(4),
            trade: cell(5),
            status: cell(6),
        })
    }
}

/// How long to let the screen settle after an action, and what counts as settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    /// Rows attached or count text present
    Data,
    /// Modal visible
    ModalOpen,
    /// Modal gone
    ModalClosed,
    /// Nothing observable; wait out the cap
    Fixed,
}

/// Interactions with the Employees list, bound to one session
#[derive(Clone)]
pub struct EmployeesPage {
    session: Session,
    data: Arc<TestData>,
}

impl EmployeesPage {
    pub fn new(session: Session, data: Arc<TestData>) -> Self {
        Self { session, data }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn data(&self) -> &TestData {
        &self.data
    }

    fn timings(&self) -> &Timings {
        self.session.timings()
    }

    fn selectors(&self) -> &EmployeesSelectors {
        &self.data.selectors.employees
    }

    fn locate(&self, chain: &SelectorChain) -> Locator {
        self.session.locator(chain.clone())
    }

    // Locators. Each call builds a fresh handle; nothing is cached.

    pub fn heading(&self) -> Locator {
        self.locate(&self.selectors().heading)
    }

    pub fn add_employee_button(&self) -> Locator {
        self.locate(&self.selectors().add_employee_button)
    }

    pub fn table(&self) -> Locator {
        self.locate(&self.selectors().table)
    }

    pub fn rows(&self) -> Locator {
        self.locate(&self.selectors().rows)
    }

    pub fn pagination_container(&self) -> Locator {
        self.locate(&self.selectors().pagination_container)
    }

    pub fn next_page_button(&self) -> Locator {
        self.locate(&self.selectors().next_page)
    }

    pub fn previous_page_button(&self) -> Locator {
        self.locate(&self.selectors().previous_page)
    }

    pub fn trade_filter(&self) -> Locator {
        self.locate(&self.selectors().trade_filter)
    }

    pub fn employee_type_filter(&self) -> Locator {
        self.locate(&self.selectors().employee_type_filter)
    }

    pub fn status_filter(&self) -> Locator {
        self.locate(&self.selectors().status_filter)
    }

    pub fn employee_count_text(&self) -> Locator {
        self.locate(&self.selectors().employee_count)
    }

    pub fn modal(&self) -> Locator {
        self.locate(&self.selectors().modal)
    }

    pub fn modal_heading(&self) -> Locator {
        self.locate(&self.selectors().modal_heading)
    }

    pub fn modal_prompt(&self) -> Locator {
        self.locate(&self.selectors().modal_prompt)
    }

    pub fn modal_back_button(&self) -> Locator {
        self.locate(&self.selectors().modal_back_button)
    }

    pub fn body(&self) -> Locator {
        self.locate(&self.selectors().body)
    }

    // Navigation

    /// Open the list at the default page and page size
    pub async fn navigate(&self) -> E2eResult<()> {
        let pages = &self.data.pages;
        self.navigate_to(pages.default_page, pages.default_per_page)
            .await
    }

    /// Open the list at `page` with `per_page` rows. Out-of-range pages are
    /// passed through untouched.
    pub async fn navigate_to(&self, page: i64, per_page: u32) -> E2eResult<()> {
        let urls = &self.data.urls;
        let url = urls.absolute(&urls.employees_page(page, per_page));
        info!("Opening employees page={} perPage={}", page, per_page);
        self.session.goto(&url).await?;
        self.settle(Settle::Data, self.timings().navigation_settle_ms)
            .await;
        Ok(())
    }

    /// Reload the current list
    pub async fn reload(&self) -> E2eResult<()> {
        self.session.reload().await?;
        self.settle(Settle::Data, self.timings().navigation_settle_ms)
            .await;
        Ok(())
    }

    // Clicks

    pub async fn click_add_employee(&self) -> E2eResult<()> {
        self.add_employee_button().click(self.action_timeout()).await?;
        self.settle(Settle::ModalOpen, self.timings().modal_settle_ms)
            .await;
        Ok(())
    }

    pub async fn close_add_employee_modal(&self) -> E2eResult<()> {
        self.modal_back_button().click(self.action_timeout()).await?;
        self.settle(Settle::ModalClosed, self.timings().modal_settle_ms)
            .await;
        Ok(())
    }

    pub async fn click_next_page(&self) -> E2eResult<()> {
        self.click_page_link(self.next_page_button()).await
    }

    pub async fn click_previous_page(&self) -> E2eResult<()> {
        self.click_page_link(self.previous_page_button()).await
    }

    async fn click_page_link(&self, link: Locator) -> E2eResult<()> {
        let before = self.first_cell_text().await.unwrap_or(None);
        link.click(self.action_timeout()).await?;
        self.session.wait_for_document_parsed().await?;

        // Wait for the first row to change, capped like any other settle.
        let cap = Timings::ms(self.timings().pagination_settle_ms);
        let before = &before;
        let changed = settle_until(cap, self.timings().poll_interval(), move || async move {
            let now = self.first_cell_text().await?;
            Ok(now.is_some() && now != *before)
        })
        .await;
        debug!("Page link settled (first row changed: {})", changed);
        Ok(())
    }

    pub async fn click_trade_filter(&self) -> E2eResult<()> {
        self.click_filter(self.trade_filter()).await
    }

    pub async fn click_employee_type_filter(&self) -> E2eResult<()> {
        self.click_filter(self.employee_type_filter()).await
    }

    pub async fn click_status_filter(&self) -> E2eResult<()> {
        self.click_filter(self.status_filter()).await
    }

    async fn click_filter(&self, filter: Locator) -> E2eResult<()> {
        filter.click(self.action_timeout()).await?;
        self.settle(Settle::Fixed, self.timings().filter_settle_ms)
            .await;
        Ok(())
    }

    async fn settle(&self, kind: Settle, cap_ms: u64) {
        let cap = Timings::ms(cap_ms);
        let poll = self.timings().poll_interval();
        let modal = self.modal();
        let modal = &modal;
        let seen = match kind {
            Settle::Data => settle_until(cap, poll, move || self.has_data()).await,
            Settle::ModalOpen => settle_until(cap, poll, move || modal.is_visible()).await,
            Settle::ModalClosed => {
                settle_until(cap, poll, move || async move {
                    Ok(modal.probe().await?.satisfies(WaitState::Hidden))
                })
                .await
            }
            Settle::Fixed => {
                tokio::time::sleep(cap).await;
                true
            }
        };
        if !seen {
            debug!("{:?} not observed within {:?}, continuing", kind, cap);
        }
    }

    async fn has_data(&self) -> E2eResult<bool> {
        if self.rows().count().await? > 0 {
            return Ok(true);
        }
        Ok(self.employee_count_text().count().await? > 0)
    }

    fn action_timeout(&self) -> Duration {
        Timings::ms(self.timings().action_ms)
    }

    // Reads

    pub async fn row_count(&self) -> E2eResult<usize> {
        self.rows().count().await
    }

    /// Trimmed text of the first cell of the first row
    pub async fn first_cell_text(&self) -> E2eResult<Option<String>> {
        let cells = self.row_cells().await?;
        Ok(cells
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|cell| cell.trim().to_string()))
    }

    async fn row_cells(&self) -> E2eResult<Vec<Vec<String>>> {
        let selectors = self.selectors();
        let js = cells_script(&selectors.rows, &selectors.row_cells)?;
        Ok(self
            .session
            .page()
            .evaluate(js)
            .await?
            .into_value::<Vec<Vec<String>>>()?)
    }

    /// Every rendered row, top to bottom
    pub async fn employee_data(&self) -> E2eResult<Vec<EmployeeRow>> {
        let rows: Vec<EmployeeRow> = self
            .row_cells()
            .await?
            .iter()
            .filter_map(|cells| EmployeeRow::from_cells(cells.as_slice()))
            .collect();
        debug!("Read {} employee rows", rows.len());
        Ok(rows)
    }

    /// Number in the "<n> Employees" label, 0 when absent
    pub async fn employee_count(&self) -> E2eResult<u64> {
        let text = self.employee_count_text().text_content().await?;
        Ok(extract_number(text.as_deref(), 0))
    }

    /// Page number from the "Showing ..." label, 1 when absent
    pub async fn current_page_number(&self) -> E2eResult<u64> {
        let text = self
            .locate(&self.selectors().showing_text)
            .text_content()
            .await?;
        Ok(extract_number(text.as_deref(), 1))
    }

    /// Page total from the "<n> Previous" pager text, 1 when absent
    pub async fn total_pages(&self) -> E2eResult<u64> {
        let text = self
            .locate(&self.selectors().total_pages_text)
            .text_content()
            .await?;
        Ok(extract_number(text.as_deref(), 1))
    }

    /// Wait for rows; if none show up, accept the count label instead
    pub async fn wait_for_employee_data(&self) -> E2eResult<()> {
        let t = self.timings();
        match self
            .rows()
            .wait_for(WaitState::Attached, Timings::ms(t.rows_ms))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_timeout() => {
                warn!("No rows rendered, waiting for the employee count instead");
                self.employee_count_text()
                    .wait_for(WaitState::Attached, Timings::ms(t.count_text_ms))
                    .await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Some("474 Employees"), 0, 474; "count label")]
    #[test_case(Some("Showing 3 of 48"), 1, 3; "first number wins")]
    #[test_case(Some("No employees"), 0, 0; "miss uses default")]
    #[test_case(None, 1, 1; "absent uses default")]
    #[test_case(Some("99999999999999999999999 Employees"), 0, 0; "overflow uses default")]
    fn extracts_number(text: Option<&str>, default: u64, expected: u64) {
        assert_eq!(extract_number(text, default), expected);
    }

    #[test]
    fn row_from_seven_cells_is_trimmed() {
        let cells = [
            "  Jane Doe ",
            "SYS-01",
            "E-7",
            " casual(net)",
            "+250 788 000 000",
            "Plumber\n",
            "active",
        ];
        let row = EmployeeRow::from_cells(&cells[..]).unwrap();
        assert_eq!(row.name, "Jane Doe");
        assert_eq!(row.employee_type, "casual(net)");
        assert_eq!(row.trade, "Plumber");
        assert_eq!(row.status, "active");
    }

    #[test]
    fn missing_cells_default_to_empty() {
        let row = EmployeeRow::from_cells(&["Only Name", "SYS-2"][..]).unwrap();
        assert_eq!(row.name, "Only Name");
        assert_eq!(row.system_id, "SYS-2");
        assert_eq!(row.employee_id, "");
        assert_eq!(row.status, "");
    }

    #[test]
    fn row_without_cells_is_skipped() {
        let empty: [&str; 0] = [];
        assert!(EmployeeRow::from_cells(&empty[..]).is_none());
    }

    #[test]
    fn extra_cells_are_ignored() {
        let cells: Vec<String> = (0..9).map(|i| format!("c{}", i)).collect();
        let row = EmployeeRow::from_cells(cells.as_slice()).unwrap();
        assert_eq!(row.status, "c6");
    }

    #[test]
    fn row_serializes_camel_case() {
        let row = EmployeeRow::from_cells(&["A", "B"][..]).unwrap();
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["systemId"], "B");
        assert!(json.get("phoneNumber").is_some());
    }
}
