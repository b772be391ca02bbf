//! Conversion run report and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// One file that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecConvertFailure {
    /// Source table.
    pub path: PathBuf,
    /// Error text.
    pub message: String,
}

/// Aggregate counters for one conversion run.
#[derive(Debug, Default, Clone)]
pub struct ReportConvert {
    /// Source tables handed to the converter.
    pub cnt_matched: u64,
    /// Tables converted (or previewed in a dry run).
    pub cnt_converted: u64,
    /// Tables that failed.
    pub cnt_failed: u64,
    /// Candidates dropped by discovery.
    pub cnt_skipped: u64,
    /// Output workbooks in discovery order.
    pub files_out: Vec<PathBuf>,
    /// Failures in discovery order.
    pub failures: Vec<SpecConvertFailure>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportConvert {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Whether any file failed.
    pub fn has_failures(&self) -> bool {
        self.cnt_failed > 0
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_converted".to_string(), self.cnt_converted);
        dict_counts.insert("cnt_failed".to_string(), self.cnt_failed);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} matched={} converted={} failed={} skipped={}",
            dict_counts["cnt_matched"],
            dict_counts["cnt_converted"],
            dict_counts["cnt_failed"],
            dict_counts["cnt_skipped"]
        )
    }

    /// Summary line followed by one `FAILED` line per failure.
    pub fn format_with_failures(&self, prefix: &str) -> String {
        let mut l_lines = vec![self.format(prefix)];
        l_lines.extend(
            self.failures
                .iter()
                .map(|failure| format!("  FAILED {}: {}", failure.path.display(), failure.message)),
        );
        l_lines.join("\n")
    }
}

impl fmt::Display for ReportConvert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[CONVERT]"))
    }
}

/// Mutable accumulator for conversion statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportConvertBuilder {
    /// See [`ReportConvert::cnt_matched`].
    pub cnt_matched: u64,
    /// See [`ReportConvert::cnt_converted`].
    pub cnt_converted: u64,
    /// See [`ReportConvert::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportConvert::files_out`].
    pub files_out: Vec<PathBuf>,
    /// See [`ReportConvert::failures`].
    pub failures: Vec<SpecConvertFailure>,
    /// See [`ReportConvert::warnings`].
    pub warnings: Vec<String>,
}

impl ReportConvertBuilder {
    /// Start with discovery counters.
    pub fn new(cnt_matched: u64, cnt_skipped: u64) -> Self {
        Self {
            cnt_matched,
            cnt_skipped,
            ..Default::default()
        }
    }

    /// Record one converted table and its output, if written.
    pub fn add_converted(&mut self, path_out: Option<PathBuf>) {
        self.cnt_converted += 1;
        self.files_out.extend(path_out);
    }

    /// Record one failed table.
    pub fn add_failed(&mut self, path: PathBuf, message: String) {
        self.failures.push(SpecConvertFailure { path, message });
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportConvert {
        ReportConvert {
            cnt_matched: self.cnt_matched,
            cnt_converted: self.cnt_converted,
            cnt_failed: self.failures.len() as u64,
            cnt_skipped: self.cnt_skipped,
            files_out: self.files_out,
            failures: self.failures,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_convert_format_and_failures() {
        let mut builder = ReportConvertBuilder::new(3, 1);
        builder.add_converted(Some(PathBuf::from("a.xlsx")));
        builder.add_converted(None);
        builder.add_failed(PathBuf::from("b.xlsx"), "column not found: \"Cq\"".to_string());
        let report = builder.build();

        assert!(report.has_failures());
        assert_eq!(report.files_out, vec![PathBuf::from("a.xlsx")]);
        assert_eq!(
            report.to_string(),
            "[CONVERT] matched=3 converted=2 failed=1 skipped=1"
        );
        assert_eq!(
            report.format_with_failures("[CONVERT]"),
            "[CONVERT] matched=3 converted=2 failed=1 skipped=1\n  FAILED b.xlsx: column not found: \"Cq\""
        );
        assert_eq!(report.to_dict()["cnt_warnings"], 0);
    }
}
