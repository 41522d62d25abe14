// src/services/courses.rs

//! Course listing parser.
//!
//! Turns one department's listing page into course records. Parsing is
//! CPU-bound and synchronous; the orchestrator runs it inside the parse
//! worker pool, never on the request-dispatch path.

use std::collections::HashMap;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CourseRecord, Section};

/// Converts a raw department body into ordered course records.
pub trait CourseParser: Send + Sync + 'static {
    fn parse(&self, department: &str, body: &str) -> Result<Vec<CourseRecord>>;
}

/// Text the catalog prints when a department offers nothing that term.
const NO_COURSES_MARKER: &str = "No courses matched your search criteria";

/// Column layout used when a listing carries no header row.
const DEFAULT_COLUMNS: [&str; 16] = [
    "code", "type", "sec", "units", "instructor", "time", "place", "final", "max", "enr", "wl",
    "req", "rstr", "textbooks", "web", "status",
];

/// Parser for the Schedule of Classes listing pages.
pub struct SocParser {
    rows: Selector,
    cells: Selector,
    headers: Selector,
    course_title: Selector,
    bold: Selector,
    course_list: Selector,
    title_pattern: Regex,
}

impl SocParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            rows: parse_selector("tr")?,
            cells: parse_selector("td")?,
            headers: parse_selector("th")?,
            course_title: parse_selector("td.CourseTitle")?,
            bold: parse_selector("b")?,
            course_list: parse_selector("div.course-list")?,
            title_pattern: Regex::new(r"^(?P<dept>.+?)\s+(?P<num>\S*\d\S*)\s+(?P<title>.+)$")
                .map_err(|e| AppError::config(format!("invalid course title pattern: {e}")))?,
        })
    }

    /// Split a course header cell into (department, number, title).
    fn parse_course_header(&self, cell: ElementRef) -> Option<(String, String, String)> {
        let text = normalize(&cell.text().collect::<String>());

        // The title is printed in bold; everything before it is "DEPT NUM".
        if let Some(bold) = cell.select(&self.bold).next() {
            let title = normalize(&bold.text().collect::<String>());
            if let Some(idx) = text.find(&title).filter(|_| !title.is_empty()) {
                if let Some((dept, num)) = split_prefix(text[..idx].trim()) {
                    return Some((dept.to_string(), num.to_string(), title));
                }
            }
        }

        let caps = self.title_pattern.captures(&text)?;
        Some((
            caps["dept"].to_string(),
            caps["num"].to_string(),
            caps["title"].to_string(),
        ))
    }

    fn parse_section(&self, row: ElementRef, columns: &HashMap<String, usize>) -> Option<Section> {
        let cells: Vec<ElementRef> = row.select(&self.cells).collect();
        if cells.len() < 5 {
            return None;
        }

        let code = normalize(&cells[0].text().collect::<String>());
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let text_of = |name: &str| -> String {
            columns
                .get(name)
                .and_then(|&idx| cells.get(idx))
                .map(|cell| normalize(&cell.text().collect::<String>()))
                .unwrap_or_default()
        };

        let instructors = columns
            .get("instructor")
            .and_then(|&idx| cells.get(idx))
            .map(|cell| {
                cell.text()
                    .map(normalize)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Some(Section {
            code,
            kind: text_of("type"),
            section: text_of("sec"),
            units: text_of("units"),
            instructors,
            time: text_of("time"),
            place: text_of("place"),
            final_exam: text_of("final"),
            max: text_of("max"),
            enrolled: text_of("enr"),
            waitlist: text_of("wl"),
            requests: text_of("req"),
            restrictions: text_of("rstr"),
            textbooks: text_of("textbooks"),
            web: text_of("web"),
            status: text_of("status"),
        })
    }

    /// Map lower-cased header names to column positions.
    fn header_columns(&self, row: ElementRef) -> Option<HashMap<String, usize>> {
        let columns: HashMap<String, usize> = row
            .select(&self.headers)
            .enumerate()
            .map(|(idx, th)| (normalize(&th.text().collect::<String>()).to_lowercase(), idx))
            .collect();
        columns.contains_key("code").then_some(columns)
    }
}

impl CourseParser for SocParser {
    fn parse(&self, department: &str, body: &str) -> Result<Vec<CourseRecord>> {
        let document = Html::parse_document(body);

        let Some(list) = document.select(&self.course_list).next() else {
            if body.contains(NO_COURSES_MARKER) {
                return Ok(Vec::new());
            }
            return Err(AppError::parse(department, "course list not found in response"));
        };

        let mut columns: HashMap<String, usize> = DEFAULT_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), idx))
            .collect();
        let mut courses: Vec<CourseRecord> = Vec::new();

        for row in list.select(&self.rows) {
            if let Some(header) = row.select(&self.course_title).next() {
                let (dept, number, title) = self.parse_course_header(header).ok_or_else(|| {
                    AppError::parse(
                        department,
                        format!(
                            "unrecognised course header '{}'",
                            normalize(&header.text().collect::<String>())
                        ),
                    )
                })?;
                courses.push(CourseRecord::new(dept, number, title));
                continue;
            }

            if let Some(header_columns) = self.header_columns(row) {
                columns = header_columns;
                continue;
            }

            if let Some(section) = self.parse_section(row, &columns) {
                match courses.last_mut() {
                    Some(course) => course.sections.push(section),
                    None => {
                        return Err(AppError::parse(
                            department,
                            format!("section {} appears before any course", section.code),
                        ));
                    }
                }
            }
        }

        Ok(courses)
    }
}

/// Collapse whitespace (including non-breaking spaces) into single spaces.
fn normalize(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split "DEPT NUM" (or a run-together "DEPTNUM") into its two parts.
fn split_prefix(prefix: &str) -> Option<(&str, &str)> {
    if let Some((dept, num)) = prefix.rsplit_once(' ') {
        return Some((dept.trim(), num));
    }
    let idx = prefix.find(|c: char| c.is_ascii_digit()).filter(|&idx| idx > 0)?;
    Some(prefix.split_at(idx))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
