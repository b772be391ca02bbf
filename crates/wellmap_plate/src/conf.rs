//! Plate geometry and pattern constants.
//!
//! The geometry matches a 96-well thermal-cycler block. Another instrument
//! layout means editing these constants, not runtime configuration.

/// Number of plate rows (`A`..=`H`).
pub const N_PLATE_ROWS: usize = 8;
/// Number of plate columns (`1`..=`12`).
pub const N_PLATE_COLS: usize = 12;
/// Number of wells on one plate.
pub const N_PLATE_WELLS: usize = N_PLATE_ROWS * N_PLATE_COLS;
/// Letter of the first plate row.
pub const C_PLATE_ROW_FIRST: char = 'A';
/// Letter of the last plate row.
pub const C_PLATE_ROW_LAST: char = 'H';

const _: () = assert!(C_PLATE_ROW_LAST as usize - C_PLATE_ROW_FIRST as usize + 1 == N_PLATE_ROWS);

/// Case-insensitive marker identifying positive/negative controls.
pub const C_CONTROL_MARKER: &str = "ctrl";

/// Row part of a well id: first ASCII letter.
pub const C_REGEX_WELL_ROW: &str = "[a-zA-Z]";
/// Column part of a well id: first decimal digit run.
pub const C_REGEX_WELL_COL: &str = "[0-9]+";
/// Group token of a label, e.g. `UT` in `UT100` or `Pos Ctrl`.
pub const C_REGEX_LABEL_GROUP: &str = r"[a-zA-Z]+\s*[a-zA-Z]+";
/// Examinee token of a label, e.g. `100` in `UT100`.
pub const C_REGEX_LABEL_EXAMINEE: &str = "[0-9]+";

/// Separator of `pattern;background;text` highlight triples.
pub const C_HIGHLIGHT_RULE_SEP: char = ';';

/// Column numbers (1-based) in plate order.
pub fn derive_plate_col_numbers() -> [u8; N_PLATE_COLS] {
    std::array::from_fn(|n_idx| n_idx as u8 + 1)
}
