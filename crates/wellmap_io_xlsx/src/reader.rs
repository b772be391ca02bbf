//! Source workbook reader: calamine ranges into a polars table and well records.

use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, open_workbook_auto};
use polars::prelude::{Column, DataFrame};
use tracing::debug;
use wellmap_plate::SpecWellRecord;

use crate::conf::C_UNNAMED_COLUMN_PREFIX;
use crate::spec::{EnumSheetSelector, SpecColumnMap, WorkbookError};
use crate::util::{
    derive_text_from_any_value, derive_text_from_data, is_integral_float, select_column_indices,
    validate_unique_columns,
};

/// One worksheet as read from the source workbook.
#[derive(Debug, Clone)]
pub struct SpecSourceSheet {
    /// Sheet name.
    pub name: String,
    /// Cell values.
    pub range: Range<Data>,
}

/// A source workbook loaded for conversion.
#[derive(Debug, Clone)]
pub struct SourceWorkbook {
    /// Path the workbook was read from.
    pub path: PathBuf,
    /// All sheets in workbook order.
    pub sheets: Vec<SpecSourceSheet>,
    /// Name of the sheet holding the PCR table.
    pub sheet_name_data: String,
    /// PCR table of the selected sheet.
    pub df_data: DataFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumColumnKind {
    Integer,
    Decimal,
    Text,
}

/// Read every sheet of `path` and parse the selected one into a table.
pub fn read_source_workbook(
    path: &Path,
    sheet_selector: &EnumSheetSelector,
) -> Result<SourceWorkbook, WorkbookError> {
    let err_read = |message: String| WorkbookError::WorkbookRead {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| err_read(e.to_string()))?;
    let l_sheet_names = workbook.sheet_names();

    let sheet_name_data = match sheet_selector {
        EnumSheetSelector::Index(n_idx) => l_sheet_names.get(*n_idx).cloned(),
        EnumSheetSelector::Name(name) => l_sheet_names.iter().find(|s| *s == name).cloned(),
    }
    .ok_or_else(|| WorkbookError::SheetNotFound {
        sheet: sheet_selector.to_string(),
        available: l_sheet_names.clone(),
    })?;

    let mut l_sheets = Vec::with_capacity(l_sheet_names.len());
    for name in &l_sheet_names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| err_read(format!("sheet {name:?}: {e}")))?;
        l_sheets.push(SpecSourceSheet {
            name: name.clone(),
            range,
        });
    }

    let range_data = l_sheets
        .iter()
        .find(|sheet| sheet.name == sheet_name_data)
        .map(|sheet| &sheet.range)
        .ok_or_else(|| err_read(format!("sheet {sheet_name_data:?} vanished while reading")))?;
    let df_data = derive_dataframe_from_range(range_data)?;
    debug!(
        path = %path.display(),
        sheet = %sheet_name_data,
        height = df_data.height(),
        width = df_data.width(),
        "source table loaded"
    );

    Ok(SourceWorkbook {
        path: path.to_path_buf(),
        sheets: l_sheets,
        sheet_name_data,
        df_data,
    })
}

/// Build a table from a sheet range whose first row is the header.
///
/// A leading column with a blank header (a saved row index) is dropped.
/// Other blank headers become `Unnamed: <col>` with the absolute column
/// index. A column whose non-empty cells are all numeric is `Int64` when
/// every value is integral, else `Float64`; any other column is text.
pub fn derive_dataframe_from_range(range: &Range<Data>) -> Result<DataFrame, WorkbookError> {
    let mut iter_rows = range.rows();
    let Some(row_header) = iter_rows.next() else {
        return Ok(DataFrame::empty());
    };
    let l_rows_body: Vec<&[Data]> = iter_rows.collect();
    let n_col_offset = range.start().map_or(0, |(_, n_col)| n_col as usize);

    let mut l_colnames: Vec<String> = row_header
        .iter()
        .enumerate()
        .map(|(n_idx, cell)| {
            derive_text_from_data(cell)
                .map(|c_text| c_text.trim().to_string())
                .filter(|c_text| !c_text.is_empty())
                .unwrap_or_else(|| format!("{C_UNNAMED_COLUMN_PREFIX}{}", n_col_offset + n_idx))
        })
        .collect();
    let n_col_skip = usize::from(
        n_col_offset == 0
            && row_header
                .first()
                .is_some_and(|cell| derive_text_from_data(cell).is_none_or(|c| c.trim().is_empty())),
    );
    l_colnames.drain(..n_col_skip);
    validate_unique_columns(&l_colnames)?;

    let mut l_columns = Vec::with_capacity(l_colnames.len());
    for (n_idx, name) in l_colnames.iter().enumerate() {
        let n_idx_col = n_idx + n_col_skip;
        let l_cells: Vec<&Data> = l_rows_body
            .iter()
            .map(|row| row.get(n_idx_col).unwrap_or(&Data::Empty))
            .collect();
        l_columns.push(derive_column(name, &l_cells));
    }

    DataFrame::new(l_columns).map_err(|e| WorkbookError::Table(e.to_string()))
}

fn derive_column_kind(l_cells: &[&Data]) -> EnumColumnKind {
    let mut enum_kind = EnumColumnKind::Integer;
    for cell in l_cells {
        match cell {
            Data::Empty => {}
            Data::String(s) if s.is_empty() => {}
            Data::Int(_) => {}
            Data::Float(f) if is_integral_float(*f) => {}
            Data::Float(f) if f.is_finite() => enum_kind = EnumColumnKind::Decimal,
            _ => return EnumColumnKind::Text,
        }
    }
    enum_kind
}

fn derive_column(name: &str, l_cells: &[&Data]) -> Column {
    match derive_column_kind(l_cells) {
        EnumColumnKind::Integer => {
            let l_values: Vec<Option<i64>> = l_cells
                .iter()
                .map(|cell| match cell {
                    Data::Int(i) => Some(*i),
                    Data::Float(f) => Some(*f as i64),
                    _ => None,
                })
                .collect();
            Column::new(name.into(), l_values)
        }
        EnumColumnKind::Decimal => {
            let l_values: Vec<Option<f64>> = l_cells
                .iter()
                .map(|cell| match cell {
                    Data::Int(i) => Some(*i as f64),
                    Data::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            Column::new(name.into(), l_values)
        }
        EnumColumnKind::Text => {
            let l_values: Vec<Option<String>> = l_cells
                .iter()
                .map(|cell| derive_text_from_data(cell))
                .collect();
            Column::new(name.into(), l_values)
        }
    }
}

/// Extract one well record per table row.
///
/// The three mapped columns are validated before any row is read. Missing
/// cells become empty text.
pub fn derive_well_records(
    df: &DataFrame,
    column_map: &SpecColumnMap,
) -> Result<Vec<SpecWellRecord>, WorkbookError> {
    let l_colnames: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let l_cols_idx = select_column_indices(&l_colnames, &column_map.headers())?;
    let l_cols = df.get_columns();

    let mut l_records = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let mut l_texts = Vec::with_capacity(l_cols_idx.len());
        for n_idx_col in &l_cols_idx {
            let value = l_cols[*n_idx_col]
                .get(n_idx_row)
                .map_err(|e| WorkbookError::Table(e.to_string()))?;
            l_texts.push(derive_text_from_any_value(value));
        }
        let [well, content, sample]: [String; 3] = l_texts
            .try_into()
            .map_err(|_| WorkbookError::Table("expected three mapped columns".to_string()))?;
        l_records.push(SpecWellRecord::new(well, content, sample));
    }
    Ok(l_records)
}
