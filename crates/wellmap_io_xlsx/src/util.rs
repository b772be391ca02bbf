//! Stateless helper utilities used by the reader and the writer.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use calamine::Data;
use polars::prelude::AnyValue;
use regex::Regex;
use rust_xlsxwriter::Color;

use crate::conf::{
    C_REGEX_RUN_DATE, C_REGEX_RUN_TIME, C_SUFFIX_MAP_WORKBOOK, N_LEN_EXCEL_SHEET_NAME_MAX,
    TUP_EXCEL_ILLEGAL,
};
use crate::spec::{EnumCellValue, SpecRunStamp, WorkbookError};

static REGEX_RUN_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_REGEX_RUN_DATE).expect("valid run date regex"));
static REGEX_RUN_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_REGEX_RUN_TIME).expect("valid run time regex"));

/// Largest magnitude printed as an integer when a float has no fraction.
const N_INTEGRAL_FLOAT_MAX: f64 = 1e15;

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Normalize cell value according to numeric/integer column flags.
pub fn convert_cell_value(
    value: &EnumCellValue,
    if_is_numeric_col: bool,
    if_is_integer_col: bool,
) -> EnumCellValue {
    match value {
        EnumCellValue::None => EnumCellValue::None,
        EnumCellValue::String(s) if s.is_empty() => EnumCellValue::None,
        EnumCellValue::String(s) if if_is_numeric_col => match s.parse::<f64>() {
            Ok(v) if v.is_finite() => EnumCellValue::Number(v),
            _ => EnumCellValue::String(s.clone()),
        },
        EnumCellValue::String(s) => EnumCellValue::String(s.clone()),
        EnumCellValue::Number(n) if !n.is_finite() => EnumCellValue::None,
        EnumCellValue::Number(n) if !if_is_numeric_col => {
            EnumCellValue::String(derive_number_text(*n))
        }
        EnumCellValue::Number(n) if if_is_integer_col && n.fract() != 0.0 => {
            EnumCellValue::String(n.to_string())
        }
        EnumCellValue::Number(n) => EnumCellValue::Number(*n),
    }
}

/// Render a number the way a spreadsheet shows it: `3.0` becomes `3`.
pub fn derive_number_text(n: f64) -> String {
    if is_integral_float(n) {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Whether `n` is a finite float without fractional part, safe as `i64`.
pub fn is_integral_float(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < N_INTEGRAL_FLOAT_MAX
}

/// Text of one source cell; `None` for empty cells and empty strings.
pub fn derive_text_from_data(value: &Data) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(derive_number_text(*f)),
        Data::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => Some(derive_number_text(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(e) => Some(e.to_string()),
    }
}

pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

/// Text form of a table value; missing values become empty text.
pub fn derive_text_from_any_value(value: AnyValue<'_>) -> String {
    match derive_cell_value_from_any_value(value) {
        EnumCellValue::None => String::new(),
        EnumCellValue::String(s) => s,
        EnumCellValue::Number(n) => derive_number_text(n),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameLikeUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), WorkbookError> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter(|(_, l_pos)| l_pos.len() > 1)
        .map(|(c_name, l_pos)| format!("{c_name:?} x{} at indices {:?}", l_pos.len(), l_pos))
        .collect::<Vec<_>>()
        .join("; ");

    Err(WorkbookError::DuplicateColumns(format!(
        "Duplicate column names detected: {c_msg}"
    )))
}

/// Resolve column names to indices, keeping the requested order.
///
/// Every name is checked before any index is returned.
pub fn select_column_indices<S: AsRef<str>>(
    columns: &[String],
    refs: &[S],
) -> Result<Vec<usize>, WorkbookError> {
    refs.iter()
        .map(|ref_col| {
            columns
                .iter()
                .position(|c_name| c_name == ref_col.as_ref())
                .ok_or_else(|| WorkbookError::MissingColumn {
                    column: ref_col.as_ref().to_string(),
                })
        })
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Map a CSS color name or `#RRGGBB` text onto an Excel color.
pub fn derive_color(text: &str) -> Option<Color> {
    let value = text.trim().to_ascii_lowercase();
    if let Some(c_hex) = value.strip_prefix('#') {
        if c_hex.len() != 6 {
            return None;
        }
        return u32::from_str_radix(c_hex, 16).ok().map(Color::RGB);
    }
    let color = match value.as_str() {
        "black" => Color::Black,
        "blue" => Color::Blue,
        "brown" => Color::Brown,
        "cyan" | "aqua" => Color::Cyan,
        "gray" | "grey" => Color::Gray,
        "green" => Color::Green,
        "lime" => Color::Lime,
        "magenta" | "fuchsia" => Color::Magenta,
        "navy" => Color::Navy,
        "orange" => Color::Orange,
        "pink" => Color::Pink,
        "purple" => Color::Purple,
        "red" => Color::Red,
        "silver" => Color::Silver,
        "white" => Color::White,
        "yellow" => Color::Yellow,
        _ => return None,
    };
    Some(color)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathAndNameUtils

/// Parse the run date/time out of a file name.
///
/// `2022-09-02` becomes `2022/09/02` and ` 12-26-21` becomes `12:26:21`.
/// Either part is `None` when the name does not carry it.
pub fn derive_run_stamp(name_file: &str) -> SpecRunStamp {
    SpecRunStamp {
        date: REGEX_RUN_DATE
            .find(name_file)
            .map(|m| m.as_str().replace('-', "/")),
        time: REGEX_RUN_TIME
            .find(name_file)
            .map(|m| m.as_str().trim_start().replace('-', ":")),
    }
}

/// First `<source stem>.<ext>` that exists, trying extensions in order.
pub fn find_companion_image<S: AsRef<str>>(path_src: &Path, exts: &[S]) -> Option<PathBuf> {
    exts.iter()
        .map(|ext| path_src.with_extension(ext.as_ref().trim_start_matches('.')))
        .find(|path_image| path_image.is_file())
}

/// Output workbook for `path_src`.
///
/// Without `dir_out` the map workbook is written next to the source as
/// `<stem>_wellmap.xlsx`; the source itself is never replaced because the
/// rebuilt copy keeps cell values only. With `dir_out` it is
/// `dir_out/<stem>.xlsx`.
pub fn derive_output_path(path_src: &Path, dir_out: Option<&Path>) -> PathBuf {
    let stem = path_src
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    match dir_out {
        Some(dir_out) => dir_out.join(format!("{stem}.xlsx")),
        None => path_src.with_file_name(format!("{stem}{C_SUFFIX_MAP_WORKBOOK}.xlsx")),
    }
}

/// Whether `path_out` names the same file as `path_src`.
///
/// Paths are compared after resolving the existing parent directories, so
/// `out/../run.xlsx` and `run.xlsx` collide.
pub fn is_same_file_path(path_src: &Path, path_out: &Path) -> bool {
    let derive_resolved = |path: &Path| -> Option<PathBuf> {
        let path_parent = match path.parent() {
            Some(path_parent) if !path_parent.as_os_str().is_empty() => path_parent,
            _ => Path::new("."),
        };
        Some(fs::canonicalize(path_parent).ok()?.join(path.file_name()?))
    };
    match (derive_resolved(path_src), derive_resolved(path_out)) {
        (Some(path_src), Some(path_out)) => path_src == path_out,
        _ => path_src == path_out,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_stamp_from_file_name() {
        let stamp =
            derive_run_stamp("admin_2022-09-02 12-26-21_CT012345 -  Quantification Cq Results.xlsx");
        assert_eq!(stamp.date.as_deref(), Some("2022/09/02"));
        assert_eq!(stamp.time.as_deref(), Some("12:26:21"));

        let stamp = derive_run_stamp("run_2022-09-02.xlsx");
        assert_eq!(stamp.date.as_deref(), Some("2022/09/02"));
        assert_eq!(stamp.time, None);

        // time requires a leading space
        let stamp = derive_run_stamp("run_12-26-21.xlsx");
        assert_eq!(stamp, SpecRunStamp::default());
    }

    #[test]
    fn test_select_column_indices_keeps_order_and_reports_missing() {
        let columns = vec!["Well".to_string(), "Content".to_string(), "Sample".to_string()];
        assert_eq!(
            select_column_indices(&columns, &["Sample", "Well"]).expect("select"),
            vec![2, 0]
        );
        let err = select_column_indices(&columns, &["Well", "Cq"]).expect_err("missing");
        assert!(matches!(err, WorkbookError::MissingColumn { column } if column == "Cq"));
    }

    #[test]
    fn test_validate_unique_columns() {
        assert!(validate_unique_columns(&["a".to_string(), "b".to_string()]).is_ok());
        let err = validate_unique_columns(&["a".to_string(), "a".to_string()]).expect_err("dup");
        assert_eq!(
            err.to_string(),
            "Duplicate column names detected: \"a\" x2 at indices [0, 1]"
        );
    }

    #[test]
    fn test_convert_cell_value() {
        let v_num = EnumCellValue::Number(25.5);
        assert_eq!(convert_cell_value(&v_num, true, false), v_num);
        assert_eq!(
            convert_cell_value(&v_num, true, true),
            EnumCellValue::String("25.5".to_string())
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(3.0), false, false),
            EnumCellValue::String("3".to_string())
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::Number(f64::NAN), true, false),
            EnumCellValue::None
        );
        assert_eq!(
            convert_cell_value(&EnumCellValue::String(String::new()), false, false),
            EnumCellValue::None
        );
    }

    #[test]
    fn test_number_and_data_text() {
        assert_eq!(derive_number_text(100.0), "100");
        assert_eq!(derive_number_text(25.25), "25.25");
        assert_eq!(derive_text_from_data(&Data::Empty), None);
        assert_eq!(derive_text_from_data(&Data::String(String::new())), None);
        assert_eq!(derive_text_from_data(&Data::Float(7.0)).as_deref(), Some("7"));
        assert_eq!(derive_text_from_data(&Data::Int(12)).as_deref(), Some("12"));
        assert_eq!(derive_text_from_data(&Data::Bool(true)).as_deref(), Some("True"));
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("  ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }

    #[test]
    fn test_derive_color() {
        assert_eq!(derive_color("yellow"), Some(Color::Yellow));
        assert_eq!(derive_color(" Red "), Some(Color::Red));
        assert_eq!(derive_color("#FFFF00"), Some(Color::RGB(0xFFFF00)));
        assert_eq!(derive_color("#FFF"), None);
        assert_eq!(derive_color("chartreuse"), None);
    }

    #[test]
    fn test_derive_output_path() {
        let path_src = Path::new("/pcr/run.xlsx");
        assert_eq!(
            derive_output_path(path_src, None),
            PathBuf::from("/pcr/run_wellmap.xlsx")
        );
        assert_eq!(
            derive_output_path(path_src, Some(Path::new("/out"))),
            PathBuf::from("/out/run.xlsx")
        );
        assert_eq!(
            derive_output_path(Path::new("/pcr/run.xls"), Some(Path::new("/out"))),
            PathBuf::from("/out/run.xlsx")
        );
        assert_eq!(
            derive_output_path(Path::new("/pcr/run.2022.xls"), None),
            PathBuf::from("/pcr/run.2022_wellmap.xlsx")
        );
    }

    #[test]
    fn test_is_same_file_path() {
        let dir_tmp = std::env::temp_dir();
        let path_src = dir_tmp.join("run.xlsx");
        assert!(is_same_file_path(&path_src, &dir_tmp.join(".").join("run.xlsx")));
        assert!(!is_same_file_path(&path_src, &dir_tmp.join("run_wellmap.xlsx")));
        assert!(is_same_file_path(
            Path::new("/no/such/dir/run.xlsx"),
            Path::new("/no/such/dir/run.xlsx")
        ));
    }
}
