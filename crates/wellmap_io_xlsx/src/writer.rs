//! XLSX writer kernel that rebuilds a source workbook with its well map sheet.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use calamine::{Data, Range};
use polars::prelude::DataFrame;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Image, Workbook, Worksheet, XlsxError};
use tracing::{debug, warn};
use wellmap_plate::conf::derive_plate_col_numbers;
use wellmap_plate::{N_PLATE_COLS, N_PLATE_ROWS, PlateGrid, SpecHighlightRules};

use crate::conf::{
    N_COL_MAP_ANCHOR, N_COLS_GAP_TABLE_TO_IMAGE, N_LEN_EXCEL_SHEET_NAME_MAX, N_ROW_MAP_ANCHOR,
    N_ROWS_GAP_MAP_TO_TABLE, N_WIDTH_MAP_CELL, TUP_CELL_RUN_DATE, TUP_CELL_RUN_TIME,
    TUP_WIDTH_TABLE_CELL,
};
use crate::reader::SourceWorkbook;
use crate::spec::{
    EnumCellValue, SpecCellFormat, SpecMapFormats, SpecMapSheetInput, SpecMapSheetOptions,
    SpecRunStamp, SpecXlsxReport, WorkbookError,
};
use crate::util::{
    convert_cell_value, derive_cell_value_from_any_value, derive_color, derive_number_text,
    estimate_unicode_string_width, is_same_file_path, sanitize_sheet_name, select_column_indices,
};

/// Zero-based row of the appended table header.
pub const N_ROW_TABLE_HEADER: usize =
    N_ROW_MAP_ANCHOR + 1 + N_PLATE_ROWS + N_ROWS_GAP_MAP_TO_TABLE;

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    formats: SpecMapFormats,
    set_sheet_names_existing: BTreeSet<String>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and format presets.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(path_file_out: PathBuf, formats: SpecMapFormats) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            formats,
            set_sheet_names_existing: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecXlsxReport> {
        self.l_reports.clone()
    }

    /// Flush workbook to disk. Idempotent.
    ///
    /// The workbook is first written to a hidden sibling file which then
    /// replaces the output, so a failed save never truncates an existing
    /// workbook.
    pub fn close(&mut self) -> Result<(), WorkbookError> {
        if self.if_closed {
            return Ok(());
        }
        let v_buf = self
            .workbook
            .save_to_buffer()
            .map_err(|e| derive_write_error(&self.path_file_out, derive_xlsx_error_text(e)))?;

        let path_tmp = derive_temp_path(&self.path_file_out);
        fs::write(&path_tmp, &v_buf)
            .map_err(|e| derive_write_error(&self.path_file_out, e.to_string()))?;
        if let Err(e) = fs::rename(&path_tmp, &self.path_file_out) {
            let _ = fs::remove_file(&path_tmp);
            return Err(derive_write_error(&self.path_file_out, e.to_string()));
        }
        self.if_closed = true;
        Ok(())
    }

    /// Copy the cell values of one source sheet.
    ///
    /// Returns the unique sheet name actually used.
    pub fn write_sheet_from_range(
        &mut self,
        sheet_name: &str,
        range: &Range<Data>,
    ) -> Result<String, WorkbookError> {
        if self.if_closed {
            return Err(WorkbookError::WriterClosed);
        }
        let sheet_name_unique = self.derive_unique_sheet_name(&sanitize_sheet_name(sheet_name, "_"));
        let fmt_datetime = derive_rust_xlsx_format(&self.formats.fmt_datetime);

        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(&sheet_name_unique)
            .map_err(|e| derive_write_error(&self.path_file_out, derive_xlsx_error_text(e)))?;

        let (n_row_start, n_col_start) = range.start().unwrap_or((0, 0));
        for (n_row, n_col, cell) in range.cells() {
            write_data_cell(
                worksheet,
                n_row_start as usize + n_row,
                n_col_start as usize + n_col,
                cell,
                &fmt_datetime,
            )
            .map_err(|message| derive_write_error(&self.path_file_out, message))?;
        }

        self.l_reports.push(SpecXlsxReport {
            sheet_name: sheet_name_unique.clone(),
            n_rows: range.end().map_or(0, |(n_row_end, _)| n_row_end as usize + 1),
            ..Default::default()
        });
        Ok(sheet_name_unique)
    }

    /// Render the well map sheet.
    ///
    /// Layout: run date and time in the first row, the titled 8x12 map
    /// anchored at `(2, 1)` with every cell of the block bordered, one blank
    /// row, then the `cols_append` columns of the source table. The image,
    /// if any, is placed right of the table at its header row.
    ///
    /// Every append column is checked before anything is written; a missing
    /// one fails with [`WorkbookError::MissingColumn`].
    pub fn write_map_sheet(
        &mut self,
        input: &SpecMapSheetInput<'_>,
        options: &SpecMapSheetOptions,
    ) -> Result<String, WorkbookError> {
        if self.if_closed {
            return Err(WorkbookError::WriterClosed);
        }

        let l_colnames_df: Vec<String> = input
            .df_data
            .get_column_names_str()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let l_cols_idx_append = select_column_indices(&l_colnames_df, &options.cols_append)?;

        let sheet_name_unique =
            self.derive_unique_sheet_name(&sanitize_sheet_name(&options.sheet_name, "_"));
        let mut report = SpecXlsxReport {
            sheet_name: sheet_name_unique.clone(),
            ..Default::default()
        };

        let path_file_out = &self.path_file_out;
        let formats = &self.formats;
        let worksheet = self.workbook.add_worksheet();
        let err_write = |message: String| derive_write_error(path_file_out, message);

        worksheet
            .set_name(&sheet_name_unique)
            .map_err(|e| err_write(derive_xlsx_error_text(e)))?;

        write_run_stamp(worksheet, input.stamp, formats).map_err(err_write)?;
        report.n_cells_styled = write_plate_map(
            worksheet,
            input.grid,
            input.rules,
            &options.title,
            formats,
            &mut report,
        )
        .map_err(err_write)?;

        let l_width_by_col = write_append_table(
            worksheet,
            input.df_data,
            &l_cols_idx_append,
            N_ROW_TABLE_HEADER,
            formats,
        )
        .map_err(err_write)?;
        report.n_rows = N_ROW_TABLE_HEADER + 1 + input.df_data.height();

        set_column_widths(worksheet, &l_width_by_col).map_err(err_write)?;

        if let Some(path_image) = input.path_image {
            let n_col_image = options.cols_append.len() + N_COLS_GAP_TABLE_TO_IMAGE;
            match insert_image(worksheet, path_image, N_ROW_TABLE_HEADER, n_col_image) {
                Ok(()) => report.if_has_image = true,
                Err(message) => {
                    warn!(image = %path_image.display(), "{message}");
                    report.warn(format!(
                        "Image skipped: {} ({message})",
                        path_image.display()
                    ));
                }
            }
        }

        debug!(
            sheet = %sheet_name_unique,
            n_rows = report.n_rows,
            n_cells_styled = report.n_cells_styled,
            "map sheet rendered"
        );
        self.l_reports.push(report);
        Ok(sheet_name_unique)
    }

    /// Excel compares sheet names case-insensitively.
    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names_existing.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if self.set_sheet_names_existing.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n_idx += 1;
        }
    }
}

/// Rebuild `source` plus its map sheet into `path_file_out`.
///
/// Source sheets are copied as values in workbook order, except a sheet
/// already carrying the map sheet name, which is replaced. The map sheet
/// is added last. Formulas, number formats, merged cells, charts and
/// embedded images of the source are not carried over, so the source path
/// itself is rejected with [`WorkbookError::OutputIsSource`].
pub fn write_map_workbook(
    path_file_out: &Path,
    source: &SourceWorkbook,
    input: &SpecMapSheetInput<'_>,
    options: &SpecMapSheetOptions,
    formats: SpecMapFormats,
) -> Result<Vec<SpecXlsxReport>, WorkbookError> {
    if is_same_file_path(&source.path, path_file_out) {
        return Err(WorkbookError::OutputIsSource {
            path: source.path.clone(),
        });
    }
    let c_name_map = sanitize_sheet_name(&options.sheet_name, "_");
    let mut writer = XlsxWriter::new(path_file_out.to_path_buf(), formats);

    for sheet in &source.sheets {
        if sanitize_sheet_name(&sheet.name, "_").eq_ignore_ascii_case(&c_name_map) {
            debug!(sheet = %sheet.name, "replacing existing map sheet");
            continue;
        }
        writer.write_sheet_from_range(&sheet.name, &sheet.range)?;
    }
    writer.write_map_sheet(input, options)?;
    writer.close()?;
    Ok(writer.report())
}

////////////////////////////////////////////////////////////////////////////////
// #region MapSections

fn write_run_stamp(
    worksheet: &mut Worksheet,
    stamp: &SpecRunStamp,
    formats: &SpecMapFormats,
) -> Result<(), String> {
    let fmt_stamp = derive_rust_xlsx_format(&formats.fmt_stamp);
    for (value, (n_row, n_col)) in [
        (&stamp.date, TUP_CELL_RUN_DATE),
        (&stamp.time, TUP_CELL_RUN_TIME),
    ] {
        if let Some(value) = value {
            write_cell_with_format(
                worksheet,
                n_row,
                n_col,
                &EnumCellValue::String(value.clone()),
                &fmt_stamp,
            )?;
        }
    }
    Ok(())
}

/// Write the titled, bordered map block; returns the number of styled cells.
fn write_plate_map(
    worksheet: &mut Worksheet,
    grid: &PlateGrid,
    rules: &SpecHighlightRules,
    title: &str,
    formats: &SpecMapFormats,
    report: &mut SpecXlsxReport,
) -> Result<usize, String> {
    let fmt_header = derive_rust_xlsx_format(&formats.fmt_map_header);
    let fmt_cell = derive_rust_xlsx_format(&formats.fmt_map_cell);

    write_cell_with_format(
        worksheet,
        N_ROW_MAP_ANCHOR,
        N_COL_MAP_ANCHOR,
        &EnumCellValue::String(title.to_string()),
        &fmt_header,
    )?;
    for (n_idx, n_col_number) in derive_plate_col_numbers().into_iter().enumerate() {
        write_cell_with_format(
            worksheet,
            N_ROW_MAP_ANCHOR,
            N_COL_MAP_ANCHOR + 1 + n_idx,
            &EnumCellValue::Number(f64::from(n_col_number)),
            &fmt_header,
        )?;
    }

    let mut set_colors_unknown = BTreeSet::new();
    let mut n_cells_styled = 0usize;
    for (n_idx_row, (c_row, row_cells)) in grid.rows().enumerate() {
        let n_row = N_ROW_MAP_ANCHOR + 1 + n_idx_row;
        write_cell_with_format(
            worksheet,
            n_row,
            N_COL_MAP_ANCHOR,
            &EnumCellValue::String(c_row.to_string()),
            &fmt_header,
        )?;

        for (n_idx_col, cell) in row_cells.iter().enumerate() {
            let value = match cell {
                Some(label) => EnumCellValue::String(label.clone()),
                None => EnumCellValue::None,
            };
            let fmt_styled = match rules.resolve(cell.as_deref()) {
                Some(style) => {
                    let l_colors = [&style.bg_color, &style.font_color];
                    for color in l_colors.into_iter().flatten() {
                        if derive_color(color).is_none() {
                            set_colors_unknown.insert(color.clone());
                        }
                    }
                    if l_colors
                        .into_iter()
                        .flatten()
                        .any(|color| derive_color(color).is_some())
                    {
                        n_cells_styled += 1;
                    }
                    Some(derive_rust_xlsx_format(&formats.fmt_map_cell.with_(
                        SpecCellFormat {
                            bg_color: style.bg_color,
                            font_color: style.font_color,
                            ..Default::default()
                        },
                    )))
                }
                None => None,
            };
            write_cell_with_format(
                worksheet,
                n_row,
                N_COL_MAP_ANCHOR + 1 + n_idx_col,
                &value,
                fmt_styled.as_ref().unwrap_or(&fmt_cell),
            )?;
        }
    }

    for color in set_colors_unknown {
        report.warn(format!("Unknown highlight color ignored: {color:?}"));
    }
    Ok(n_cells_styled)
}

/// Write selected source columns with a header row; returns column widths.
fn write_append_table(
    worksheet: &mut Worksheet,
    df_data: &DataFrame,
    cols_idx: &[usize],
    n_row_header: usize,
    formats: &SpecMapFormats,
) -> Result<Vec<usize>, String> {
    let fmt_header = derive_rust_xlsx_format(&formats.fmt_table_header);
    let fmt_text = derive_rust_xlsx_format(&formats.fmt_text);
    let fmt_integer = derive_rust_xlsx_format(&formats.fmt_integer);
    let fmt_decimal = derive_rust_xlsx_format(&formats.fmt_decimal);

    let l_cols = df_data.get_columns();
    let mut l_width_by_col = vec![0usize; cols_idx.len()];

    for (n_idx_out, n_idx_col) in cols_idx.iter().enumerate() {
        let col = &l_cols[*n_idx_col];
        let c_name = col.name().to_string();
        l_width_by_col[n_idx_out] = estimate_unicode_string_width(&c_name);
        write_cell_with_format(
            worksheet,
            n_row_header,
            n_idx_out,
            &EnumCellValue::String(c_name),
            &fmt_header,
        )?;

        let if_is_numeric_col = col.dtype().is_numeric();
        let if_is_integer_col = if_is_numeric_col && col.dtype().is_integer();
        let fmt_col = if if_is_integer_col {
            &fmt_integer
        } else if if_is_numeric_col {
            &fmt_decimal
        } else {
            &fmt_text
        };

        for n_idx_row in 0..df_data.height() {
            let value_raw = derive_cell_value_from_any_value(
                col.get(n_idx_row)
                    .map_err(|err| format!("Failed to access cell value: {err}"))?,
            );
            let value = convert_cell_value(&value_raw, if_is_numeric_col, if_is_integer_col);
            l_width_by_col[n_idx_out] =
                usize::max(l_width_by_col[n_idx_out], estimate_width_len(&value));
            write_cell_with_format(
                worksheet,
                n_row_header + 1 + n_idx_row,
                n_idx_out,
                &value,
                fmt_col,
            )?;
        }
    }

    Ok(l_width_by_col)
}

/// Widen table columns to their content; map columns keep a fixed minimum.
fn set_column_widths(worksheet: &mut Worksheet, width_by_col: &[usize]) -> Result<(), String> {
    let (n_min, n_max) = TUP_WIDTH_TABLE_CELL;
    let n_cols_map_end = N_COL_MAP_ANCHOR + 1 + N_PLATE_COLS;
    let n_cols_total = usize::max(width_by_col.len(), n_cols_map_end);

    for n_idx_col in 0..n_cols_total {
        let n_width_table = width_by_col
            .get(n_idx_col)
            .map_or(0, |n_width| (n_width + 2).clamp(n_min, n_max));
        let n_width_map = if (N_COL_MAP_ANCHOR..n_cols_map_end).contains(&n_idx_col) {
            N_WIDTH_MAP_CELL
        } else {
            0.0
        };
        let n_width_final = f64::max(n_width_table as f64, n_width_map);
        if n_width_final > 0.0 {
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, n_width_final)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn insert_image(
    worksheet: &mut Worksheet,
    path_image: &Path,
    n_row: usize,
    n_col: usize,
) -> Result<(), String> {
    let image = Image::new(path_image).map_err(derive_xlsx_error_text)?;
    worksheet
        .insert_image(cast_row_num(n_row)?, cast_col_num(n_col)?, &image)
        .map_err(derive_xlsx_error_text)?;
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellWriting

/// Estimate displayed width units for one normalized cell value.
fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::String(s) => estimate_unicode_string_width(s),
        EnumCellValue::Number(n) => derive_number_text(*n).len(),
    }
}

fn write_data_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &Data,
    fmt_datetime: &Format,
) -> Result<(), String> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        Data::Empty => return Ok(()),
        Data::String(val) if val.is_empty() => return Ok(()),
        Data::String(val) | Data::DateTimeIso(val) | Data::DurationIso(val) => {
            worksheet.write_string(n_row, n_col, val.as_str())
        }
        Data::Int(val) => worksheet.write_number(n_row, n_col, *val as f64),
        Data::Float(val) => worksheet.write_number(n_row, n_col, *val),
        Data::Bool(val) => worksheet.write_boolean(n_row, n_col, *val),
        Data::DateTime(val) => {
            worksheet.write_number_with_format(n_row, n_col, val.as_f64(), fmt_datetime)
        }
        Data::Error(val) => worksheet.write_string(n_row, n_col, val.to_string()),
    }
    .map_err(derive_xlsx_error_text)?;
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), String> {
    match value {
        EnumCellValue::None => {
            worksheet
                .write_blank(cast_row_num(row_idx)?, cast_col_num(col_idx)?, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::String(val) => {
            worksheet
                .write_string_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    val,
                    format,
                )
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Number(val) => {
            worksheet
                .write_number_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    *val,
                    format,
                )
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatConversion

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(color) = spec.bg_color.as_deref().and_then(derive_color) {
        format = format.set_background_color(color);
    }
    if let Some(color) = spec.font_color.as_deref().and_then(derive_color) {
        format = format.set_font_color(color);
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        0 => FormatBorder::None,
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Casting

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

fn derive_write_error(path: &Path, message: String) -> WorkbookError {
    WorkbookError::WorkbookWrite {
        path: path.to_path_buf(),
        message,
    }
}

static N_TEMP_FILE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Hidden sibling of the output, unique per process and per call.
fn derive_temp_path(path_file_out: &Path) -> PathBuf {
    let name_file = path_file_out
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".to_string());
    let n_seq = N_TEMP_FILE_SEQ.fetch_add(1, Ordering::Relaxed);
    path_file_out.with_file_name(format!(".{name_file}.{}.{n_seq}.tmp", std::process::id()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
