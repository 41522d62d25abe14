//! Service layer for the catalog crawler.
//!
//! This module contains the collaborators the orchestrator drives:
//! - Department discovery (`discover_departments`)
//! - Page fetching (`Transport`, `HttpTransport`)
//! - Course listing parsing (`CourseParser`, `SocParser`)

mod courses;
mod departments;
mod transport;

pub use courses::{CourseParser, SocParser};
pub use departments::discover_departments;
pub use transport::{HttpTransport, Transport};
