//! Services - lookup orchestration and front-end state
//!
//! - `lookup` - one search from raw query to `CompanyRecord`
//! - `render` - `CompanyRecord` to a display view model
//! - `app_state` - status, busy flag, input and result for the front ends

pub mod app_state;
pub mod lookup;
pub mod render;

// Re-export commonly used types
pub use app_state::{AppState, StatusLine, Tone};
pub use lookup::{build_record, LookupService};
pub use render::ResultView;
