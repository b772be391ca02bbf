//! Source table discovery: entry expansion and tidy-up.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::report::{ReportDiscover, ReportDiscoverBuilder};
use crate::spec::{DiscoverError, EnumDiscoverEntryKind, SpecDiscoverOptions};
use crate::util::{
    SpecExcludePatterns, compile_glob, compile_regex, concat_dir_and_entry, derive_entry_kind,
    derive_file_name, expand_env_vars, list_dir_names, normalize_separators, split_glob_entry,
    split_regex_entry,
};

/// Expand configured file entries under `dir_input` into existing tables.
///
/// Every entry is prefixed with `dir_input` (absolute entries are kept
/// as-is), `$VAR` expanded and separator-normalised, then expanded by kind:
/// - `dir/!<regex>!regex`: names in `dir` matching `<regex>` (the hook
///   suffix may also be `!re`, `!gex` or a bare `!`, any case),
/// - glob: names in the entry's directory matching its file-name pattern,
/// - literal: passed through.
///
/// Candidates are de-duplicated and sorted; non-files and names matching
/// [`SpecDiscoverOptions::patterns_exclude_files`] are skipped. Directories
/// that cannot be listed become warnings in the report.
///
/// Returns [`DiscoverError`] only for an invalid pattern, a malformed regex
/// entry or a missing input directory.
pub fn discover_tables<P, S>(
    dir_input: P,
    entries: &[S],
    spec_options: &SpecDiscoverOptions,
) -> Result<ReportDiscover, DiscoverError>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let c_dir = derive_entry_text(
        &dir_input.as_ref().to_string_lossy(),
        spec_options.if_expand_env_vars,
    );
    let path_dir = if c_dir.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(&c_dir)
    };
    if !path_dir.is_dir() {
        return Err(DiscoverError::InputDirectoryNotFound(path_dir));
    }

    let spec_excl = SpecExcludePatterns::from_raw(&spec_options.patterns_exclude_files)?;
    let mut builder_report = ReportDiscoverBuilder::default();
    let mut l_candidates: Vec<PathBuf> = Vec::new();

    for entry in entries {
        let c_entry = derive_entry_text(entry.as_ref(), spec_options.if_expand_env_vars);
        let c_entry = concat_dir_and_entry(&c_dir, &c_entry);
        let enum_kind = derive_entry_kind(&c_entry);
        debug!(entry = %c_entry, kind = ?enum_kind, "expanding entry");

        match enum_kind {
            EnumDiscoverEntryKind::Literal => l_candidates.push(PathBuf::from(c_entry)),
            EnumDiscoverEntryKind::Glob => {
                let (path_dir_entry, pattern) = split_glob_entry(&c_entry);
                let glob = compile_glob(&pattern)?;
                expand_dir_entries(&path_dir_entry, &mut builder_report, &mut l_candidates, |n| {
                    glob.is_match(n)
                });
            }
            EnumDiscoverEntryKind::Regex => {
                let (path_dir_entry, pattern) = split_regex_entry(&c_entry)?;
                let regex = compile_regex(&pattern)?;
                expand_dir_entries(&path_dir_entry, &mut builder_report, &mut l_candidates, |n| {
                    regex.is_match(n)
                });
            }
        }
    }

    let mut set_candidates: BTreeSet<PathBuf> = BTreeSet::new();
    for path_candidate in l_candidates {
        builder_report.add_scanned();
        if !set_candidates.insert(path_candidate) {
            builder_report.add_skipped();
        }
    }

    for path_file in set_candidates {
        let name_file = derive_file_name(&path_file);
        if spec_excl.is_excluded(&name_file) {
            debug!(path = %path_file.display(), "excluded by name");
            builder_report.add_skipped();
            continue;
        }
        if !path_file.is_file() {
            debug!(path = %path_file.display(), "not an existing file");
            builder_report.add_skipped();
            continue;
        }
        builder_report.add_file(path_file);
    }

    let report = builder_report.build();
    for warning in &report.warnings {
        warn!("{warning}");
    }
    Ok(report)
}

fn derive_entry_text(text: &str, if_expand_env_vars: bool) -> String {
    if if_expand_env_vars {
        normalize_separators(&expand_env_vars(text))
    } else {
        normalize_separators(text)
    }
}

fn expand_dir_entries<F>(
    path_dir: &Path,
    builder_report: &mut ReportDiscoverBuilder,
    l_candidates: &mut Vec<PathBuf>,
    is_match: F,
) where
    F: Fn(&str) -> bool,
{
    match list_dir_names(path_dir) {
        Ok(l_names) => l_candidates.extend(
            l_names
                .into_iter()
                .filter(|name| is_match(name))
                .map(|name| path_dir.join(name)),
        ),
        Err(e) => builder_report.add_warning(format!(
            "Failed to list directory {} ({e})",
            path_dir.display()
        )),
    }
}
