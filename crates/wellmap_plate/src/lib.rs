//! `wellmap_plate` v1:
//! Table-to-plate transformation kernel.
//!
//! Modules:
//! - `conf`      : plate geometry and pattern constants
//! - `spec`      : records, grid model and errors
//! - `util`      : identifier parsing and control classification
//! - `grid`      : plate template and table-to-grid projection
//! - `highlight` : ordered highlight rule resolution
pub mod conf;
pub mod grid;
pub mod highlight;
pub mod spec;
pub mod util;

pub use conf::{C_PLATE_ROW_FIRST, C_PLATE_ROW_LAST, N_PLATE_COLS, N_PLATE_ROWS, N_PLATE_WELLS};
pub use grid::{build_template, project, project_with_report};
pub use highlight::{SpecHighlightRules, resolve_style};
pub use spec::{
    PlateError, PlateGrid, SpecCellStyle, SpecHighlightRule, SpecParsedWell,
    SpecProjectionReport, SpecWellLabel, SpecWellRecord,
};
pub use util::{
    classify_control, derive_label, derive_well_label, parse_label_examinee, parse_label_group,
    parse_well,
};
