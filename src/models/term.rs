//! Terms and per-term work units.

use serde::{Deserialize, Serialize};

/// A configured term.
///
/// `code` identifies the term in the snapshot; `label` is the upstream
/// year-term value sent with each department request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermSpec {
    pub code: String,
    pub label: String,
}

impl TermSpec {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }
}

/// One term's worth of department requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub term: TermSpec,
    pub departments: Vec<String>,
}

impl WorkUnit {
    /// Number of department requests this unit dispatches.
    pub fn len(&self) -> usize {
        self.departments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }
}
