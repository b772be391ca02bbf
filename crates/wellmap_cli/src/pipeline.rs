//! Per-file conversion and the parallel run over all discovered tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use wellmap_io_xlsx::{
    SpecMapSheetInput, WorkbookError, derive_default_map_formats, derive_output_path,
    derive_run_stamp, derive_well_records, find_companion_image, read_source_workbook,
    write_map_workbook,
};
use wellmap_plate::{PlateGrid, SpecProjectionReport, project_with_report};

use crate::config::SpecRunPlan;
use crate::report::{ReportConvert, ReportConvertBuilder};

/// Result of converting one table.
#[derive(Debug, Clone)]
pub struct SpecConvertOutcome {
    /// Source table.
    pub path_src: PathBuf,
    /// Written workbook; `None` in a dry run.
    pub path_out: Option<PathBuf>,
    /// Projected plate.
    pub grid: PlateGrid,
    /// Projection counters.
    pub report_projection: SpecProjectionReport,
    /// Non-fatal issues raised while writing.
    pub warnings: Vec<String>,
}

/// Convert one source table into a workbook carrying its well map.
///
/// The table is read and projected first. The source file is only read;
/// the map workbook goes to [`derive_output_path`]. With `if_dry_run`
/// nothing is written.
pub fn convert_table_to_map(
    path_src: &Path,
    plan: &SpecRunPlan,
    if_dry_run: bool,
) -> Result<SpecConvertOutcome, WorkbookError> {
    info!(file = %path_src.display(), "processing");
    let source = read_source_workbook(path_src, &plan.sheet_selector)?;
    let l_records = derive_well_records(&source.df_data, &plan.column_map)?;
    let (grid, report_projection) = project_with_report(&l_records)?;
    debug!(file = %path_src.display(), "projected: {report_projection}");

    let mut outcome = SpecConvertOutcome {
        path_src: path_src.to_path_buf(),
        path_out: None,
        grid,
        report_projection,
        warnings: Vec::new(),
    };
    if if_dry_run {
        return Ok(outcome);
    }

    if let Some(dir_output) = &plan.dir_output {
        fs::create_dir_all(dir_output).map_err(|e| WorkbookError::WorkbookWrite {
            path: dir_output.clone(),
            message: e.to_string(),
        })?;
    }
    let name_file = path_src
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = derive_run_stamp(&name_file);
    let path_image = find_companion_image(path_src, &plan.exts_image);
    let path_out = derive_output_path(path_src, plan.dir_output.as_deref());

    let input = SpecMapSheetInput {
        grid: &outcome.grid,
        rules: &plan.rules,
        stamp: &stamp,
        df_data: &source.df_data,
        path_image: path_image.as_deref(),
    };
    let l_reports = write_map_workbook(
        &path_out,
        &source,
        &input,
        &plan.options_map,
        derive_default_map_formats(),
    )?;

    for report in &l_reports {
        for warning in &report.warnings {
            warn!(file = %path_src.display(), sheet = %report.sheet_name, "{warning}");
            outcome
                .warnings
                .push(format!("{}: {warning}", path_src.display()));
        }
    }
    info!(file = %path_src.display(), out = %path_out.display(), "completed");
    outcome.path_out = Some(path_out);
    Ok(outcome)
}

/// Convert every file, in parallel when more than one worker is allowed.
///
/// Outcomes and failures are reported in the order of `files`; one failing
/// file never stops the others. A file whose output workbook is already
/// claimed by an earlier file fails with [`WorkbookError::OutputConflict`]
/// without being read.
pub fn run_conversion(
    files: &[PathBuf],
    plan: &SpecRunPlan,
    if_dry_run: bool,
    cnt_skipped: u64,
) -> (ReportConvert, Vec<SpecConvertOutcome>) {
    let mut builder = ReportConvertBuilder::new(files.len() as u64, cnt_skipped);
    for warning in &plan.warnings {
        builder.add_warning(warning.clone());
    }

    let l_conflicts = derive_output_conflicts(files, plan);
    let convert_one =
        |(path_src, conflict): (&PathBuf, &Option<(PathBuf, PathBuf)>)| match conflict {
            Some((path_out, path_other)) => Err(WorkbookError::OutputConflict {
                path: path_out.clone(),
                other: path_other.clone(),
            }),
            None => convert_table_to_map(path_src, plan, if_dry_run),
        };

    let n_workers_max = calculate_worker_limit(plan.n_workers);
    let convert_serial = || {
        files
            .iter()
            .zip(l_conflicts.iter())
            .map(convert_one)
            .collect::<Vec<_>>()
    };

    let l_results = if n_workers_max <= 1 || files.len() <= 1 {
        convert_serial()
    } else {
        match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
            Ok(thread_pool) => thread_pool.install(|| {
                files
                    .par_iter()
                    .zip(l_conflicts.par_iter())
                    .map(convert_one)
                    .collect::<Vec<_>>()
            }),
            Err(err) => {
                builder.add_warning(format!(
                    "Failed to initialize thread pool (workers={n_workers_max}): {err}; fallback to serial conversion."
                ));
                convert_serial()
            }
        }
    };

    let mut l_outcomes = Vec::with_capacity(l_results.len());
    for (path_src, res_convert) in files.iter().zip(l_results) {
        match res_convert {
            Ok(outcome) => {
                builder.add_converted(outcome.path_out.clone());
                for warning in &outcome.warnings {
                    builder.add_warning(warning.clone());
                }
                l_outcomes.push(outcome);
            }
            Err(err) => {
                warn!(file = %path_src.display(), "failed: {err}");
                builder.add_failed(path_src.clone(), err.to_string());
            }
        }
    }
    (builder.build(), l_outcomes)
}

/// For each file, the output workbook and the earlier file claiming it.
fn derive_output_conflicts(
    files: &[PathBuf],
    plan: &SpecRunPlan,
) -> Vec<Option<(PathBuf, PathBuf)>> {
    let mut dict_claims: BTreeMap<PathBuf, &PathBuf> = BTreeMap::new();
    files
        .iter()
        .map(|path_src| {
            let path_out = derive_output_path(path_src, plan.dir_output.as_deref());
            match dict_claims.get(&path_out) {
                Some(path_other) => Some((path_out, (*path_other).clone())),
                None => {
                    dict_claims.insert(path_out, path_src);
                    None
                }
            }
        })
        .collect()
}

/// Requested workers clamped to the CPU count; unset means CPUs, at most 8.
pub fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    use calamine::{Data, Reader, open_workbook_auto};
    use rust_xlsxwriter::Workbook;
    use wellmap_io_fs::discover_tables;

    use super::*;
    use crate::config::parse_config;

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new() -> Self {
            let n = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos();
            let path = std::env::temp_dir().join(format!("wellmap_cli_test_{n}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    /// Minimal PCR export with an index column; `wells` are `(well, content, sample)`.
    fn write_table(path: &Path, wells: &[(&str, &str, &str)]) {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("0").expect("name");
        for (n_col, c_name) in ["Well", "Content", "Sample", "Cq"].iter().enumerate() {
            worksheet
                .write_string(0, n_col as u16 + 1, *c_name)
                .expect("header");
        }
        for (n_idx, (well, content, sample)) in wells.iter().enumerate() {
            let n_row = n_idx as u32 + 1;
            worksheet.write_number(n_row, 0, n_idx as f64).expect("index");
            worksheet.write_string(n_row, 1, *well).expect("well");
            worksheet.write_string(n_row, 2, *content).expect("content");
            if !sample.is_empty() {
                worksheet.write_string(n_row, 3, *sample).expect("sample");
            }
            worksheet
                .write_number(n_row, 4, 20.0 + n_idx as f64 / 4.0)
                .expect("cq");
        }
        workbook.save(path).expect("save table");
    }

    fn plan_for(dir: &Path, extra_out: &str) -> SpecRunPlan {
        let c_yaml = format!(
            "inp:\n  path: {}\n  files: ['!(?i)admin.*[.]xlsx!regex']\n  data:\n    ws_name: '0'\n    highlight: ['Pos Ctrl;yellow;', 'Neg Ctrl;;red']\n    append_cols: [Well, Content, Cq]\nout:\n  workers: 2\n{extra_out}",
            dir.display()
        );
        parse_config(&c_yaml, Path::new("trial.yaml"))
            .expect("parse")
            .resolve()
            .expect("resolve")
    }

    fn discover(plan: &SpecRunPlan) -> (Vec<PathBuf>, u64) {
        let report = discover_tables(&plan.dir_input, &plan.entries, &plan.discover_options())
            .expect("discover");
        (report.files, report.cnt_skipped)
    }

    #[test]
    fn end_to_end_conversion_next_to_source() {
        let tmp = TestDir::new();
        let path_ok = tmp.path().join("admin_2022-09-02 12-26-21_run.xlsx");
        write_table(
            &path_ok,
            &[
                ("A01", "Unkn", "UT100"),
                ("A02", "Pos Ctrl", ""),
                ("H12", "Neg Ctrl", ""),
            ],
        );
        let path_bad = tmp.path().join("admin_bad.xlsx");
        write_table(&path_bad, &[("Z99", "Unkn", "UT1")]);
        std::fs::write(tmp.path().join("~$admin_lock.xlsx"), b"lock").expect("lock");
        std::fs::write(tmp.path().join("other.xlsx"), b"ignored").expect("other");

        let plan = plan_for(tmp.path(), "");
        let (l_files, cnt_skipped) = discover(&plan);
        assert_eq!(l_files.len(), 2);

        let (report, l_outcomes) = run_conversion(&l_files, &plan, false, cnt_skipped);
        assert_eq!(report.cnt_matched, 2);
        assert_eq!(report.cnt_converted, 1);
        assert_eq!(report.cnt_failed, 1);
        assert_eq!(report.failures[0].path, path_bad);
        assert!(report.failures[0].message.contains("Z99"));
        assert_eq!(l_outcomes.len(), 1);
        assert_eq!(l_outcomes[0].report_projection.cnt_controls, 2);
        let path_out = tmp.path().join("admin_2022-09-02 12-26-21_run_wellmap.xlsx");
        assert_eq!(l_outcomes[0].path_out.as_deref(), Some(path_out.as_path()));

        let mut workbook_src = open_workbook_auto(&path_ok).expect("reopen source");
        assert_eq!(workbook_src.sheet_names(), vec!["0"]);

        let mut workbook = open_workbook_auto(&path_out).expect("reopen");
        assert_eq!(workbook.sheet_names(), vec!["0", "tbl2map"]);
        let range = workbook.worksheet_range("tbl2map").expect("map");
        let cell = |n_row: u32, n_col: u32| range.get_value((n_row, n_col)).cloned();
        assert_eq!(cell(0, 0), Some(Data::String("2022/09/02".to_string())));
        assert_eq!(cell(3, 2), Some(Data::String("UT100".to_string())));
        assert_eq!(cell(3, 3), Some(Data::String("Pos Ctrl".to_string())));
        assert_eq!(cell(10, 13), Some(Data::String("Neg Ctrl".to_string())));
        assert_eq!(cell(12, 2), Some(Data::String("Cq".to_string())));
        assert_eq!(cell(13, 2), Some(Data::Float(20.0)));

        let mut workbook_bad = open_workbook_auto(&path_bad).expect("reopen bad");
        assert_eq!(workbook_bad.sheet_names(), vec!["0"]);
        assert!(workbook_bad.worksheet_range("0").is_ok());
        assert!(!tmp.path().join("admin_bad_wellmap.xlsx").exists());

        // map workbooks from an earlier run are not picked up again
        let (l_files_again, _) = discover(&plan);
        assert_eq!(l_files_again, l_files);
    }

    #[test]
    fn source_formulas_survive_conversion() {
        let tmp = TestDir::new();
        let path_src = tmp.path().join("admin_run.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("0").expect("name");
        for (n_col, c_name) in ["Well", "Content", "Sample", "Cq"].iter().enumerate() {
            worksheet
                .write_string(0, n_col as u16 + 1, *c_name)
                .expect("header");
        }
        worksheet.write_number(1, 0, 0.0).expect("index");
        worksheet.write_string(1, 1, "A01").expect("well");
        worksheet.write_string(1, 2, "Unkn").expect("content");
        worksheet.write_string(1, 3, "UT1").expect("sample");
        worksheet.write_number(1, 4, 20.0).expect("cq");
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Calc").expect("name");
        worksheet.write_number(0, 0, 2.0).expect("number");
        worksheet.write_formula(0, 1, "=A1*2").expect("formula");
        workbook.save(&path_src).expect("save source");
        let v_before = std::fs::read(&path_src).expect("read source");

        let plan = plan_for(tmp.path(), "");
        let (report, _) = run_conversion(&[path_src.clone()], &plan, false, 0);
        assert_eq!(report.cnt_converted, 1);
        assert_eq!(report.files_out, vec![tmp.path().join("admin_run_wellmap.xlsx")]);

        assert_eq!(std::fs::read(&path_src).expect("read source"), v_before);
        let mut workbook = open_workbook_auto(&path_src).expect("reopen");
        let range = workbook.worksheet_formula("Calc").expect("formulas");
        assert_eq!(range.get_value((0, 1)).map(String::as_str), Some("A1*2"));

        let mut workbook_out = open_workbook_auto(&report.files_out[0]).expect("reopen out");
        assert_eq!(workbook_out.sheet_names(), vec!["0", "Calc", "tbl2map"]);
    }

    #[test]
    fn same_named_sources_do_not_share_an_output() {
        let tmp = TestDir::new();
        let dir_s1 = tmp.path().join("s1");
        let dir_s2 = tmp.path().join("s2");
        std::fs::create_dir_all(&dir_s1).expect("s1");
        std::fs::create_dir_all(&dir_s2).expect("s2");
        let path_first = dir_s1.join("admin_run.xlsx");
        let path_second = dir_s2.join("admin_run.xlsx");
        write_table(&path_first, &[("A01", "Unkn", "FIRST")]);
        write_table(&path_second, &[("A01", "Unkn", "SECOND")]);
        let dir_out = tmp.path().join("out");

        let plan = plan_for(tmp.path(), &format!("  dir: {}\n", dir_out.display()));
        let l_files = vec![path_first.clone(), path_second.clone()];
        let (report, l_outcomes) = run_conversion(&l_files, &plan, false, 0);

        let path_out = dir_out.join("admin_run.xlsx");
        assert_eq!(report.cnt_converted, 1);
        assert_eq!(report.cnt_failed, 1);
        assert_eq!(report.files_out, vec![path_out.clone()]);
        assert_eq!(l_outcomes[0].path_src, path_first);
        assert_eq!(report.failures[0].path, path_second);
        assert!(report.failures[0].message.contains("already written"));

        let mut workbook = open_workbook_auto(&path_out).expect("reopen");
        let range = workbook.worksheet_range("tbl2map").expect("map");
        assert_eq!(
            range.get_value((3, 2)).cloned(),
            Some(Data::String("FIRST".to_string()))
        );
    }

    #[test]
    fn output_dir_equal_to_source_dir_is_refused() {
        let tmp = TestDir::new();
        let path_src = tmp.path().join("admin_run.xlsx");
        write_table(&path_src, &[("A01", "Unkn", "UT1")]);
        let v_before = std::fs::read(&path_src).expect("read source");

        let plan = plan_for(tmp.path(), &format!("  dir: {}\n", tmp.path().display()));
        let (report, _) = run_conversion(&[path_src.clone()], &plan, false, 0);
        assert_eq!(report.cnt_failed, 1);
        assert!(report.failures[0].message.starts_with("refusing to overwrite"));
        assert_eq!(std::fs::read(&path_src).expect("read source"), v_before);
    }

    #[test]
    fn output_dir_and_dry_run() {
        let tmp = TestDir::new();
        let path_src = tmp.path().join("admin_run.xlsx");
        write_table(&path_src, &[("B03", "Unkn", "UT7")]);
        let v_before = std::fs::read(&path_src).expect("read source");
        let dir_out = tmp.path().join("out");

        let plan = plan_for(tmp.path(), &format!("  dir: {}\n", dir_out.display()));
        let (l_files, cnt_skipped) = discover(&plan);

        let (report, l_outcomes) = run_conversion(&l_files, &plan, true, cnt_skipped);
        assert_eq!(report.cnt_converted, 1);
        assert!(report.files_out.is_empty());
        assert_eq!(l_outcomes[0].grid.get_by_indices(1, 2), Some("UT7"));
        assert!(!dir_out.exists());

        let (report, _) = run_conversion(&l_files, &plan, false, cnt_skipped);
        assert_eq!(report.files_out, vec![dir_out.join("admin_run.xlsx")]);
        assert_eq!(std::fs::read(&path_src).expect("read source"), v_before);
        let mut workbook = open_workbook_auto(dir_out.join("admin_run.xlsx")).expect("reopen");
        assert_eq!(workbook.sheet_names(), vec!["0", "tbl2map"]);
    }

    #[test]
    fn missing_append_column_fails_file_only() {
        let tmp = TestDir::new();
        let path_src = tmp.path().join("admin_run.xlsx");
        write_table(&path_src, &[("A01", "Unkn", "UT1")]);
        let mut plan = plan_for(tmp.path(), "");
        plan.options_map.cols_append.push("Cq Mean".to_string());

        let (report, l_outcomes) = run_conversion(&[path_src], &plan, false, 0);
        assert_eq!(report.cnt_failed, 1);
        assert!(l_outcomes.is_empty());
        assert_eq!(report.failures[0].message, "column not found: \"Cq Mean\"");
    }

    #[test]
    fn worker_limit_is_clamped() {
        assert_eq!(calculate_worker_limit(Some(0)), 1);
        assert_eq!(calculate_worker_limit(Some(1)), 1);
        let n_default = calculate_worker_limit(None);
        assert!((1..=8).contains(&n_default));
    }
}
