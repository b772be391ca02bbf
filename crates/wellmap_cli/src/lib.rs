//! `wellmap_cli` v1:
//! Run orchestration for the `wellmap` binary.
//!
//! Modules:
//! - `config`   : YAML model, loading and resolution into a run plan
//! - `logging`  : tracing subscriber setup
//! - `pipeline` : per-file conversion and the parallel run
//! - `preview`  : terminal plate rendering for dry runs
//! - `report`   : run report model
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod preview;
pub mod report;

pub use config::{ConfigError, SpecConfig, SpecRunPlan, load_config};
pub use pipeline::{SpecConvertOutcome, convert_table_to_map, run_conversion};
pub use report::{ReportConvert, ReportConvertBuilder};
