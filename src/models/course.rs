//! Course records produced by the parse workers.

use serde::{Deserialize, Serialize};

/// A course and its sections, in listing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// Department prefix as printed in the listing (e.g. "CS", "I&C SCI")
    pub department: String,

    /// Course number (e.g. "161", "H2A")
    pub number: String,

    pub title: String,

    #[serde(default)]
    pub sections: Vec<Section>,
}

/// One offered section of a course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub code: String,
    /// LEC, DIS, LAB, ...
    pub kind: String,
    pub section: String,
    pub units: String,
    pub instructors: Vec<String>,
    pub time: String,
    pub place: String,
    pub final_exam: String,
    pub max: String,
    pub enrolled: String,
    pub waitlist: String,
    pub requests: String,
    pub restrictions: String,
    /// Textbook link text, usually "Bookstore"
    #[serde(default)]
    pub textbooks: String,
    #[serde(default)]
    pub web: String,
    pub status: String,
}

impl CourseRecord {
    pub fn new(
        department: impl Into<String>,
        number: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            department: department.into(),
            number: number.into(),
            title: title.into(),
            sections: Vec::new(),
        }
    }
}
