// src/services/departments.rs

//! Department discovery.
//!
//! Extracts the department codes offered by the catalog search form on the
//! main page. Pure: no network access, same body always yields the same list.

use std::collections::HashSet;

use scraper::{Html, Selector};

use crate::error::{AppError, Result};

/// Selector for the department drop-down of the search form.
const DEPT_SELECT: &str = r#"select[name="Dept"]"#;

/// Pseudo-option that selects every department at once.
const ALL_DEPARTMENTS: &str = "ALL";

/// Extract the ordered, de-duplicated department codes from the main page.
pub fn discover_departments(body: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(body);
    let select_sel = parse_selector(DEPT_SELECT)?;
    let option_sel = parse_selector("option")?;

    let select = document
        .select(&select_sel)
        .next()
        .ok_or_else(|| AppError::discovery("department selector not found on main page"))?;

    let mut seen = HashSet::new();
    let departments: Vec<String> = select
        .select(&option_sel)
        .filter_map(|option| option.value().attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != ALL_DEPARTMENTS)
        .filter(|value| seen.insert(value.to_string()))
        .map(str::to_string)
        .collect();

    if departments.is_empty() {
        return Err(AppError::discovery(
            "department selector on main page has no departments",
        ));
    }

    log::debug!("Discovered {} departments", departments.len());
    Ok(departments)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
