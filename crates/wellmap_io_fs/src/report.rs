//! Discovery report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Aggregate counters and results for one `discover_tables` run.
#[derive(Debug, Default, Clone)]
pub struct ReportDiscover {
    /// Existing source tables, de-duplicated and sorted.
    pub files: Vec<PathBuf>,
    /// Candidate paths produced by entry expansion (before de-dup).
    pub cnt_scanned: u64,
    /// Number of files kept.
    pub cnt_matched: u64,
    /// Candidates dropped as duplicates, non-files or excluded names.
    pub cnt_skipped: u64,
    /// Non-fatal warnings collected during expansion.
    pub warnings: Vec<String>,
}

impl ReportDiscover {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} scanned={} matched={} skipped={} warnings={}",
            dict_counts["cnt_scanned"],
            dict_counts["cnt_matched"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportDiscover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[DISCOVER]"))
    }
}

/// Mutable accumulator for discovery statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportDiscoverBuilder {
    /// See [`ReportDiscover::files`].
    pub files: Vec<PathBuf>,
    /// See [`ReportDiscover::cnt_scanned`].
    pub cnt_scanned: u64,
    /// See [`ReportDiscover::cnt_skipped`].
    pub cnt_skipped: u64,
    /// See [`ReportDiscover::warnings`].
    pub warnings: Vec<String>,
}

impl ReportDiscoverBuilder {
    /// Increment scanned count by one.
    pub fn add_scanned(&mut self) {
        self.cnt_scanned += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.cnt_skipped += 1;
    }

    /// Keep one file.
    pub fn add_file(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportDiscover {
        ReportDiscover {
            cnt_matched: self.files.len() as u64,
            files: self.files,
            cnt_scanned: self.cnt_scanned,
            cnt_skipped: self.cnt_skipped,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReportDiscover;

    #[test]
    fn report_discover_to_dict_and_format() {
        let report = ReportDiscover {
            files: vec![],
            cnt_scanned: 6,
            cnt_matched: 3,
            cnt_skipped: 3,
            warnings: vec!["w".to_string()],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_scanned"], 6);
        assert_eq!(dict_counts["cnt_matched"], 3);
        assert_eq!(dict_counts["cnt_skipped"], 3);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[DISCOVER]");
        assert_eq!(txt, "[DISCOVER] scanned=6 matched=3 skipped=3 warnings=1");
        assert_eq!(report.to_string(), txt);
    }
}
