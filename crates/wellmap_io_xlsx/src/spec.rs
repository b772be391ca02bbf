//! Shared XLSX specification models and errors.

use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use thiserror::Error;
use wellmap_plate::{PlateError, PlateGrid, SpecHighlightRules};

use crate::conf::{C_MAP_TITLE_DEFAULT, C_SHEET_NAME_MAP_DEFAULT, L_APPEND_COLUMNS_DEFAULT};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification; every `None` field is left at Excel default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color, CSS name or `#RRGGBB`.
    pub bg_color: Option<String>,
    /// Font color, CSS name or `#RRGGBB`.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Named format presets of the map sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMapFormats {
    /// Run date/time cells.
    pub fmt_stamp: SpecCellFormat,
    /// Map corner, column numbers and row letters.
    pub fmt_map_header: SpecCellFormat,
    /// Map body cells; highlight colors are merged on top.
    pub fmt_map_cell: SpecCellFormat,
    /// Appended table header.
    pub fmt_table_header: SpecCellFormat,
    /// Text body cells.
    pub fmt_text: SpecCellFormat,
    /// Integer body cells.
    pub fmt_integer: SpecCellFormat,
    /// Decimal body cells.
    pub fmt_decimal: SpecCellFormat,
    /// Date/time cells copied from source sheets.
    pub fmt_datetime: SpecCellFormat,
}

/// Normalized cell value during conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReadSpecification

/// Worksheet reference: zero-based position or exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumSheetSelector {
    /// Select by zero-based position.
    Index(usize),
    /// Select by sheet name.
    Name(String),
}

impl Default for EnumSheetSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl fmt::Display for EnumSheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(n_idx) => write!(f, "#{n_idx}"),
            Self::Name(name) => write!(f, "{name:?}"),
        }
    }
}

/// Source headers of the three columns the projection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnMap {
    /// Header of the well id column.
    pub well: String,
    /// Header of the content column.
    pub content: String,
    /// Header of the sample column.
    pub sample: String,
}

impl Default for SpecColumnMap {
    fn default() -> Self {
        Self {
            well: "Well".to_string(),
            content: "Content".to_string(),
            sample: "Sample".to_string(),
        }
    }
}

impl SpecColumnMap {
    /// Headers in `well, content, sample` order.
    pub fn headers(&self) -> [&str; 3] {
        [
            self.well.as_str(),
            self.content.as_str(),
            self.sample.as_str(),
        ]
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteSpecification

/// Run date and time parsed from a source file name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecRunStamp {
    /// `YYYY/MM/DD`.
    pub date: Option<String>,
    /// `HH:MM:SS`.
    pub time: Option<String>,
}

/// Per-map-sheet options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMapSheetOptions {
    /// Requested sheet name; sanitized before use.
    pub sheet_name: String,
    /// Text of the map's corner cell.
    pub title: String,
    /// Source columns copied below the map, in order.
    pub cols_append: Vec<String>,
}

impl Default for SpecMapSheetOptions {
    fn default() -> Self {
        Self {
            sheet_name: C_SHEET_NAME_MAP_DEFAULT.to_string(),
            title: C_MAP_TITLE_DEFAULT.to_string(),
            cols_append: L_APPEND_COLUMNS_DEFAULT
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Everything rendered into one map sheet.
#[derive(Debug, Clone, Copy)]
pub struct SpecMapSheetInput<'a> {
    /// Projected plate.
    pub grid: &'a PlateGrid,
    /// Highlight rules applied to the plate cells.
    pub rules: &'a SpecHighlightRules,
    /// Date/time written above the map.
    pub stamp: &'a SpecRunStamp,
    /// Full source table; `cols_append` are taken from it.
    pub df_data: &'a DataFrame,
    /// Image placed right of the appended table.
    pub path_image: Option<&'a Path>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-sheet write report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Actual unique sheet name in the workbook.
    pub sheet_name: String,
    /// Rows written (including headers and annotations).
    pub n_rows: usize,
    /// Plate cells that received a highlight color.
    pub n_cells_styled: usize,
    /// Whether an image was inserted.
    pub if_has_image: bool,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failures while reading a source workbook or writing the output workbook.
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// The workbook cannot be opened or a sheet cannot be parsed.
    #[error("failed to read workbook {}: {message}", .path.display())]
    WorkbookRead {
        /// Source workbook.
        path: PathBuf,
        /// Reader message.
        message: String,
    },

    /// The selected worksheet does not exist.
    #[error("sheet {sheet} not found (available: {})", .available.join(", "))]
    SheetNotFound {
        /// Requested sheet.
        sheet: String,
        /// Sheet names present in the workbook.
        available: Vec<String>,
    },

    /// Two header cells carry the same text.
    #[error("{0}")]
    DuplicateColumns(String),

    /// A configured column is absent from the source header.
    #[error("column not found: {column:?}")]
    MissingColumn {
        /// Requested header text.
        column: String,
    },

    /// Building or reading the in-memory table failed.
    #[error("table error: {0}")]
    Table(String),

    /// The workbook cannot be built or saved.
    #[error("failed to write workbook {}: {message}", .path.display())]
    WorkbookWrite {
        /// Output workbook.
        path: PathBuf,
        /// Writer message.
        message: String,
    },

    /// The output would replace the source workbook.
    #[error("refusing to overwrite source workbook {}", .path.display())]
    OutputIsSource {
        /// Source workbook.
        path: PathBuf,
    },

    /// Another source of the same run already writes this output.
    #[error("output {} is already written for {}", .path.display(), .other.display())]
    OutputConflict {
        /// Contested output workbook.
        path: PathBuf,
        /// Earlier source claiming it.
        other: PathBuf,
    },

    /// The writer was used after [`crate::writer::XlsxWriter::close`].
    #[error("cannot write after close()")]
    WriterClosed,

    /// Projection failure surfaced through the workbook layer.
    #[error(transparent)]
    Plate(#[from] PlateError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
