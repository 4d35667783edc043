//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `http` - pooled reqwest client, retry wrapper, URL/JSON helpers
//! - `error` - `LookupError` taxonomy
//! - `registry` - company registry providers (OpenCorporates, ABR, proxy, mock)
//! - `geocode` - Nominatim geocoding, direct or proxied
//! - `capabilities` - speech and map host capabilities with stubs
//! - `proxy_server` - hyper HTTP server for `/api/search` and `/api/geocode`

pub mod capabilities;
pub mod error;
pub mod geocode;
pub mod http;
pub mod proxy_server;
pub mod registry;

// Re-export commonly used types
pub use error::LookupError;
pub use geocode::GeocodeClient;
pub use http::{FetchText, HttpClient, RetryPolicy};
pub use registry::{mock_entity, ProviderClient};
