//! Office locator library
//!
//! Company head-office lookup: registry search, geocoding, franchise and
//! territory signals. Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
