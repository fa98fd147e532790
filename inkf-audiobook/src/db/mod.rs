//! Database access for inkf-audiobook
//!
//! Schema creation lives in `inkf_common::db`; this module holds the
//! queries the service runs against it.

pub mod jobs;
pub mod profiles;
pub mod settings;
