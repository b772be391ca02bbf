//! Plate data model and error types.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::conf::{C_PLATE_ROW_FIRST, C_PLATE_ROW_LAST, N_PLATE_COLS, N_PLATE_ROWS, N_PLATE_WELLS};

////////////////////////////////////////////////////////////////////////////////
// #region Records

/// One row of source data, as read from the result table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecWellRecord {
    /// Well id: row letter + 2-digit column, e.g. `A01`.
    pub well: String,
    /// Content column, e.g. `Unkn`, `Pos Ctrl`.
    pub content: String,
    /// Sample column, e.g. `UT100`.
    pub sample: String,
}

impl SpecWellRecord {
    pub fn new(
        well: impl Into<String>,
        content: impl Into<String>,
        sample: impl Into<String>,
    ) -> Self {
        Self {
            well: well.into(),
            content: content.into(),
            sample: sample.into(),
        }
    }
}

/// Well position decomposed from a well id.
///
/// Always within the plate: `row` in `A..=H`, `col` in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecParsedWell {
    /// Row letter.
    pub row: char,
    /// 1-based column number.
    pub col: u8,
}

impl SpecParsedWell {
    /// Build a position, returning `None` outside the plate.
    pub fn new(row: char, col: usize) -> Option<Self> {
        if !(C_PLATE_ROW_FIRST..=C_PLATE_ROW_LAST).contains(&row) {
            return None;
        }
        if !(1..=N_PLATE_COLS).contains(&col) {
            return None;
        }
        Some(Self { row, col: col as u8 })
    }

    /// Build a position from zero-based grid indices.
    pub fn from_indices(row_idx: usize, col_idx: usize) -> Option<Self> {
        if row_idx >= N_PLATE_ROWS {
            return None;
        }
        Self::new((C_PLATE_ROW_FIRST as u8 + row_idx as u8) as char, col_idx + 1)
    }

    /// Zero-based row index.
    pub fn row_idx(&self) -> usize {
        (self.row as u8 - C_PLATE_ROW_FIRST as u8) as usize
    }

    /// Zero-based column index.
    pub fn col_idx(&self) -> usize {
        self.col as usize - 1
    }
}

impl fmt::Display for SpecParsedWell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.row, self.col)
    }
}

/// Display label derived from one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecWellLabel {
    /// `content` for controls, `sample` otherwise.
    pub text: String,
    /// Whether the content carries the control marker.
    pub if_is_control: bool,
    /// Leading alphabetic token(s), e.g. `UT`.
    pub group: Option<String>,
    /// Leading numeric token, e.g. `100`.
    pub examinee: Option<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PlateGrid

/// Fixed 8x12 mapping from well position to optional label.
///
/// Every one of the 96 cells always exists; `None` is an unused well.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlateGrid {
    cells: [[Option<String>; N_PLATE_COLS]; N_PLATE_ROWS],
}

impl PlateGrid {
    /// Number of cells; always [`N_PLATE_WELLS`].
    pub fn len(&self) -> usize {
        self.cells.iter().map(|row| row.len()).sum()
    }

    /// Number of cells carrying a label.
    pub fn count_loaded(&self) -> usize {
        self.cells.iter().flatten().filter(|v| v.is_some()).count()
    }

    /// Label at `well`, if any.
    pub fn get(&self, well: &SpecParsedWell) -> Option<&str> {
        self.cells[well.row_idx()][well.col_idx()].as_deref()
    }

    /// Label at zero-based `(row_idx, col_idx)`; `None` out of range too.
    pub fn get_by_indices(&self, row_idx: usize, col_idx: usize) -> Option<&str> {
        self.cells
            .get(row_idx)
            .and_then(|row| row.get(col_idx))
            .and_then(|v| v.as_deref())
    }

    /// Store `value` at `well`, returning the previous value.
    pub fn set(&mut self, well: &SpecParsedWell, value: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.cells[well.row_idx()][well.col_idx()], value)
    }

    /// Row-major iterator over all 96 cells.
    pub fn iter(&self) -> impl Iterator<Item = (SpecParsedWell, Option<&str>)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row_idx, row)| {
            row.iter().enumerate().filter_map(move |(col_idx, value)| {
                SpecParsedWell::from_indices(row_idx, col_idx).map(|well| (well, value.as_deref()))
            })
        })
    }

    /// Rows in plate order, each with its letter.
    pub fn rows(&self) -> impl Iterator<Item = (char, &[Option<String>; N_PLATE_COLS])> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(row_idx, row)| ((C_PLATE_ROW_FIRST as u8 + row_idx as u8) as char, row))
    }

    /// Merge two grids with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &PlateGrid) -> PlateGrid {
        let mut grid_merged = self.clone();
        for (row_merged, row_other) in grid_merged.cells.iter_mut().zip(other.cells.iter()) {
            for (cell_merged, cell_other) in row_merged.iter_mut().zip(row_other.iter()) {
                if cell_other.is_some() {
                    cell_merged.clone_from(cell_other);
                }
            }
        }
        grid_merged
    }
}

const _: () = assert!(N_PLATE_ROWS * N_PLATE_COLS == N_PLATE_WELLS);

/// Counters collected while projecting one table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecProjectionReport {
    /// Number of input records.
    pub cnt_records: usize,
    /// Cells carrying a label after projection.
    pub cnt_loaded: usize,
    /// Records classified as controls.
    pub cnt_controls: usize,
    /// Records that overwrote an earlier record for the same well.
    pub cnt_duplicates: usize,
    /// Records whose derived label was blank.
    pub cnt_blank_labels: usize,
    /// Distinct label groups, sorted.
    pub groups: BTreeSet<String>,
}

impl fmt::Display for SpecProjectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records={} loaded={} controls={} duplicates={} blank={} groups={}",
            self.cnt_records,
            self.cnt_loaded,
            self.cnt_controls,
            self.cnt_duplicates,
            self.cnt_blank_labels,
            self.groups.iter().cloned().collect::<Vec<_>>().join(",")
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Highlight

/// One `pattern;background;text` highlight rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecHighlightRule {
    /// Regex searched in the cell text.
    pub pattern: String,
    /// Background fill color; `None` when left empty.
    pub bg_color: Option<String>,
    /// Font color; `None` when left empty.
    pub font_color: Option<String>,
}

/// Resolved visual style for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCellStyle {
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellStyle {
    /// CSS-like declaration, e.g. `background-color:yellow;color:red`.
    pub fn to_css(&self) -> String {
        let mut l_decls = Vec::with_capacity(2);
        if let Some(value) = &self.bg_color {
            l_decls.push(format!("background-color:{value}"));
        }
        if let Some(value) = &self.font_color {
            l_decls.push(format!("color:{value}"));
        }
        l_decls.join(";")
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Failures raised by the plate kernel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlateError {
    /// A well id cannot be decomposed into an on-plate row and column.
    #[error(
        "malformed well id {well:?}{}: {reason}",
        derive_record_suffix(.n_idx_record)
    )]
    MalformedWellId {
        /// Offending well id.
        well: String,
        /// Zero-based index of the offending record, when known.
        n_idx_record: Option<usize>,
        /// What went wrong.
        reason: String,
    },

    /// A highlight triple is not `pattern;background;text`.
    #[error("invalid highlight rule {rule:?}: expected `pattern;background;text`")]
    InvalidHighlightRule {
        /// Raw rule text.
        rule: String,
    },

    /// A highlight pattern is not a valid regex.
    #[error("invalid highlight pattern {pattern:?}: {message}")]
    InvalidHighlightPattern {
        /// Raw pattern.
        pattern: String,
        /// Regex compiler message.
        message: String,
    },
}

fn derive_record_suffix(n_idx_record: &Option<usize>) -> String {
    n_idx_record
        .map(|n_idx| format!(" (record {n_idx})"))
        .unwrap_or_default()
}

impl PlateError {
    /// Attach the index of the record that failed.
    pub fn with_record(self, n_idx: usize) -> Self {
        match self {
            Self::MalformedWellId { well, reason, .. } => Self::MalformedWellId {
                well,
                n_idx_record: Some(n_idx),
                reason,
            },
            other => other,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_well_rejects_off_plate_positions() {
        assert!(SpecParsedWell::new('A', 1).is_some());
        assert!(SpecParsedWell::new('H', 12).is_some());
        assert!(SpecParsedWell::new('I', 1).is_none());
        assert!(SpecParsedWell::new('A', 0).is_none());
        assert!(SpecParsedWell::new('A', 13).is_none());
        assert!(SpecParsedWell::from_indices(8, 0).is_none());
    }

    #[test]
    fn parsed_well_display_pads_column() {
        let well = SpecParsedWell::new('B', 3).expect("on plate");
        assert_eq!(well.to_string(), "B03");
        assert_eq!(well.row_idx(), 1);
        assert_eq!(well.col_idx(), 2);
    }

    #[test]
    fn plate_grid_merge_is_right_biased() {
        let a1 = SpecParsedWell::new('A', 1).expect("on plate");
        let b2 = SpecParsedWell::new('B', 2).expect("on plate");

        let mut grid_left = PlateGrid::default();
        grid_left.set(&a1, Some("left".to_string()));
        grid_left.set(&b2, Some("kept".to_string()));
        let mut grid_right = PlateGrid::default();
        grid_right.set(&a1, Some("right".to_string()));

        let grid_merged = grid_left.merge(&grid_right);
        assert_eq!(grid_merged.get(&a1), Some("right"));
        assert_eq!(grid_merged.get(&b2), Some("kept"));
        assert_eq!(grid_merged.len(), N_PLATE_WELLS);
    }

    #[test]
    fn malformed_well_message_carries_record_index() {
        let err = PlateError::MalformedWellId {
            well: "99".to_string(),
            n_idx_record: None,
            reason: "no row letter".to_string(),
        }
        .with_record(4);
        assert_eq!(
            err.to_string(),
            "malformed well id \"99\" (record 4): no row letter"
        );
    }

    #[test]
    fn cell_style_css_skips_empty_parts() {
        let style = SpecCellStyle {
            bg_color: Some("yellow".to_string()),
            font_color: None,
        };
        assert_eq!(style.to_css(), "background-color:yellow");
    }
}
