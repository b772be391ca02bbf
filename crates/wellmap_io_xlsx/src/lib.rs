//! `wellmap_io_xlsx` v1:
//! Spreadsheet side of the table-to-map conversion.
//!
//! Modules:
//! - `conf`   : Excel limits, map-sheet layout and default presets
//! - `spec`   : formats, options, reports and errors
//! - `util`   : pure helper functions
//! - `reader` : source workbook into a table and well records
//! - `writer` : workbook rebuild with the rendered map sheet
pub mod conf;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_MAP_TITLE_DEFAULT, C_SHEET_NAME_MAP_DEFAULT, C_SUFFIX_MAP_WORKBOOK, L_APPEND_COLUMNS_DEFAULT,
    L_IMAGE_EXTENSIONS_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, derive_default_map_formats,
    derive_map_workbook_glob,
};
pub use reader::{
    SourceWorkbook, SpecSourceSheet, derive_dataframe_from_range, derive_well_records,
    read_source_workbook,
};
pub use spec::{
    EnumCellValue, EnumSheetSelector, SpecCellFormat, SpecColumnMap, SpecMapFormats,
    SpecMapSheetInput, SpecMapSheetOptions, SpecRunStamp, SpecXlsxReport, WorkbookError,
};
pub use util::{
    derive_color, derive_output_path, derive_run_stamp, find_companion_image, is_same_file_path,
    sanitize_sheet_name,
};
pub use writer::{N_ROW_TABLE_HEADER, XlsxWriter, write_map_workbook};
