//! `wellmap_io_fs` v1:
//! Source table discovery.
//!
//! Modules:
//! - `discover` : entry expansion and tidy-up orchestration
//! - `spec`     : enums/options/errors
//! - `report`   : discovery report model
//! - `util`     : pattern and path helpers

pub mod discover;
pub mod report;
pub mod spec;
mod util;

pub use discover::discover_tables;
pub use report::{ReportDiscover, ReportDiscoverBuilder};
pub use spec::{DiscoverError, EnumDiscoverEntryKind, SpecDiscoverOptions};
pub use util::expand_env_vars;
