//! Offline checks of the test data registry and the pure helpers the
//! scenarios rely on. No browser needed.

use std::io::Write;

use fixa_e2e::data::TestData;
use fixa_e2e::employees::{extract_number, EmployeeRow};
use fixa_e2e::scenarios::{self, check_monotonic, check_page_size};
use fixa_e2e::selector::{Selector, SelectorChain};

#[test]
fn yaml_file_overrides_selectors_and_pages() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
credentials:
  identifier: staging@fixa.test
pages:
  per_page_values: [10, 25]
selectors:
  employees:
    add_employee_button:
      - '[data-testid="add-employee"]'
      - 'button:has-text("Add Employee")'
"#
    )
    .unwrap();

    let data = TestData::from_file(file.path()).unwrap();
    assert_eq!(data.credentials.identifier, "staging@fixa.test");
    assert_eq!(data.credentials.secret, "change-me");
    assert_eq!(data.pages.per_page_values, vec![10, 25]);
    assert_eq!(data.pages.invalid_pages, vec![999, -1, 0]);
    assert_eq!(
        data.selectors.employees.add_employee_button,
        SelectorChain::single(Selector::css(r#"[data-testid="add-employee"]"#))
            .or(Selector::has_text("button", "Add Employee"))
    );
}

#[test]
fn invalid_selector_in_yaml_is_rejected() {
    let err = TestData::from_yaml("selectors:\n  employees:\n    rows: 'text=/(/'\n").unwrap_err();
    assert!(err.to_string().contains("text=/(/"), "{}", err);
}

#[test]
fn registry_matches_dom_contract() {
    let data = TestData::default();
    let e = &data.selectors.employees;
    assert_eq!(e.add_employee_button.to_string(), r#"button:has-text("Add Employee")"#);
    assert_eq!(e.rows.to_string(), "tbody tr, role=row");
    assert_eq!(e.next_page.to_string(), r#"a[aria-label="Go to next page"]"#);
    assert_eq!(e.previous_page.to_string(), r#"a[aria-label="Go to previous page"]"#);
    assert_eq!(e.employee_count.to_string(), r"text=/\d+\s+Employees/");
    assert_eq!(e.modal.to_string(), "role=dialog, .modal, .dialog");
    assert_eq!(
        data.urls.employees_page(999, 10),
        "/employees?page=999&perPage=10"
    );
}

#[test]
fn rows_and_counts_from_rendered_text() {
    let cells = vec![
        " Alice ".to_string(),
        "S1".to_string(),
        "E1".to_string(),
        "special".to_string(),
    ];
    let row = EmployeeRow::from_cells(cells.as_slice()).unwrap();
    assert_eq!(row.name, "Alice");
    assert_eq!(row.employee_type, "special");
    assert_eq!(row.trade, "");

    assert_eq!(extract_number(Some("474   Employees"), 0), 474);
    assert_eq!(extract_number(Some("Employees"), 0), 0);
}

#[test]
fn per_page_properties_from_literal_example() {
    // perPage=5 rendered 5, perPage=20 rendered 20
    check_page_size(5, 5).unwrap();
    check_page_size(20, 20).unwrap();
    check_monotonic(&[(5, 5), (20, 20)]).unwrap();

    assert!(check_page_size(21, 20).is_err());
    assert!(check_monotonic(&[(5, 5), (20, 4)]).is_err());
}

#[test]
fn suite_covers_every_listed_case() {
    let ids: Vec<&str> = scenarios::all().iter().map(|s| s.id).collect();
    for id in [
        "TC-EMP-001",
        "TC-EMP-002",
        "TC-EMP-003",
        "TC-EMP-004",
        "TC-EMP-005",
        "TC-EMP-006",
        "TC-EMP-007",
    ] {
        assert!(ids.contains(&id), "missing {}", id);
    }
}
