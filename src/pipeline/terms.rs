// src/pipeline/terms.rs

//! Term expansion: one work unit per configured term.

use crate::models::{TermSpec, WorkUnit};

/// Pair every configured term with the full department list, keeping configuration order.
pub fn expand_terms(terms: &[TermSpec], departments: &[String]) -> Vec<WorkUnit> {
    terms
        .iter()
        .map(|term| WorkUnit {
            term: term.clone(),
            departments: departments.to_vec(),
        })
        .collect()
}
