//! Domain models - the company record and the pure helpers around it
//!
//! - `company` - `CompanyRecord`, its registry `Entity` and derived signals
//! - `inference` - franchise/territory classifiers and query sanitization

pub mod company;
pub mod inference;

// Re-export commonly used types at module level
pub use company::{
    CompanyRecord, Entity, Franchise, FranchiseSignal, GeoPoint, Source, Territory,
    TerritorySignal,
};
pub use inference::{infer_franchise, infer_territory, safe_query};
