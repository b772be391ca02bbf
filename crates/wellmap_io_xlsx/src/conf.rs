//! XLSX constants, map-sheet layout and default preset factories.

use crate::spec::{SpecCellFormat, SpecMapFormats};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

////////////////////////////////////////////////////////////////////////////////
// #region Defaults

/// Name of the sheet holding the well map.
pub const C_SHEET_NAME_MAP_DEFAULT: &str = "tbl2map";
/// Text in the top-left corner of the map table.
pub const C_MAP_TITLE_DEFAULT: &str = "Well";
/// Companion image extensions, tried in order.
pub const L_IMAGE_EXTENSIONS_DEFAULT: [&str; 3] = ["png", "jpg", "bmp"];
/// Source columns copied below the map.
pub const L_APPEND_COLUMNS_DEFAULT: [&str; 8] = [
    "Well",
    "Fluor",
    "Target",
    "Content",
    "Sample",
    "Cq",
    "Cq Mean",
    "Cq Std. Dev",
];
/// Appended to the source stem when the map workbook is written next to it.
pub const C_SUFFIX_MAP_WORKBOOK: &str = "_wellmap";
/// Prefix given to blank source headers, followed by the column index.
pub const C_UNNAMED_COLUMN_PREFIX: &str = "Unnamed: ";

/// Run date in a file name, e.g. `2022-09-02`.
pub const C_REGEX_RUN_DATE: &str = r"[0-9]{4}-[0-9]{2}-[0-9]{2}";
/// Run time in a file name, e.g. ` 12-26-21` (leading space required).
pub const C_REGEX_RUN_TIME: &str = r" [0-9]{2}-[0-9]{2}-[0-9]{2}";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MapLayout

/// Zero-based cell of the run date.
pub const TUP_CELL_RUN_DATE: (usize, usize) = (0, 0);
/// Zero-based cell of the run time.
pub const TUP_CELL_RUN_TIME: (usize, usize) = (0, 1);
/// Rows left above the map table.
pub const N_ROW_MAP_ANCHOR: usize = 2;
/// Columns left of the map table.
pub const N_COL_MAP_ANCHOR: usize = 1;
/// Blank rows between the map and the appended table.
pub const N_ROWS_GAP_MAP_TO_TABLE: usize = 1;
/// Blank columns between the appended table and the image.
pub const N_COLS_GAP_TABLE_TO_IMAGE: usize = 1;

/// Map column width in characters.
pub const N_WIDTH_MAP_CELL: f64 = 10.0;
/// Bounds applied to appended-table column widths.
pub const TUP_WIDTH_TABLE_CELL: (usize, usize) = (8, 40);

// #endregion
////////////////////////////////////////////////////////////////////////////////

/// Basename glob matching map workbooks written next to their source.
pub fn derive_map_workbook_glob() -> String {
    format!("*{C_SUFFIX_MAP_WORKBOOK}.xlsx")
}

/// Build default format presets used by [`crate::writer::XlsxWriter`].
pub fn derive_default_map_formats() -> SpecMapFormats {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Calibri".to_string()),
        font_size: Some(11),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };
    let cfg_map_fmt_spec = cfg_base_fmt_spec.with_(SpecCellFormat {
        border: Some(1),
        align: Some("center".to_string()),
        ..Default::default()
    });

    SpecMapFormats {
        fmt_stamp: cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
        fmt_map_header: cfg_map_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
        fmt_map_cell: cfg_map_fmt_spec,
        fmt_table_header: cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            ..Default::default()
        }),
        fmt_text: cfg_base_fmt_spec.clone(),
        fmt_integer: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
        fmt_decimal: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("General".to_string()),
            ..Default::default()
        }),
        fmt_datetime: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("yyyy-mm-dd hh:mm:ss".to_string()),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_formats() {
        let formats = derive_default_map_formats();
        assert_eq!(formats.fmt_map_cell.border, Some(1));
        assert_eq!(formats.fmt_map_header.border, Some(1));
        assert_eq!(formats.fmt_map_header.bold, Some(true));
        assert_eq!(formats.fmt_stamp.bold, Some(true));
        assert_eq!(formats.fmt_stamp.border, None);
        assert_eq!(formats.fmt_integer.font_name.as_deref(), Some("Calibri"));
    }
}
