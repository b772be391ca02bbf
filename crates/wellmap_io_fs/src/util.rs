use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use globset::{Glob, GlobMatcher};
use regex::{Captures, Regex};

use crate::spec::{DiscoverError, EnumDiscoverEntryKind};

static REGEX_ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\w+)|\{([^}]*)\})").expect("valid env var regex")
});

static REGEX_ENTRY_HOOK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!(?:re)?(?:gex)?$").expect("valid hook regex"));

const C_GLOB_META_CHARS: &[char] = &['*', '?', '['];

////////////////////////////////////////////////////////////////////////////////
// #region EntryText

/// Expand `$VAR` and `${VAR}`; unknown variables are left untouched.
pub fn expand_env_vars(text: &str) -> String {
    REGEX_ENV_VAR
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Use `/` as the only separator.
pub(crate) fn normalize_separators(text: &str) -> String {
    text.replace('\\', "/")
}

/// Prefix a relative entry with the input directory.
pub(crate) fn concat_dir_and_entry(c_dir: &str, entry: &str) -> String {
    if Path::new(entry).is_absolute() || entry.starts_with('/') {
        return entry.to_string();
    }
    let c_dir = c_dir.trim_end_matches('/');
    if c_dir.is_empty() {
        return entry.to_string();
    }
    format!("{c_dir}/{entry}")
}

/// Kind of one joined entry; an existing file is literal even when its
/// name carries glob characters, e.g. `run [1].xlsx`.
pub(crate) fn derive_entry_kind(entry: &str) -> EnumDiscoverEntryKind {
    if REGEX_ENTRY_HOOK.is_match(entry) {
        return EnumDiscoverEntryKind::Regex;
    }
    let (_, name) = split_parent_and_name(entry);
    if name.contains(C_GLOB_META_CHARS) && !Path::new(entry).is_file() {
        EnumDiscoverEntryKind::Glob
    } else {
        EnumDiscoverEntryKind::Literal
    }
}

/// Split `dir/!<regex>!regex` into its directory and pattern.
///
/// The hook is stripped first, so the pattern itself may contain `!`.
pub(crate) fn split_regex_entry(entry: &str) -> Result<(PathBuf, String), DiscoverError> {
    let err_malformed = || DiscoverError::MalformedRegexEntry {
        entry: entry.to_string(),
    };
    let m_hook = REGEX_ENTRY_HOOK.find(entry).ok_or_else(err_malformed)?;
    let c_body = &entry[..m_hook.start()];
    let (c_dir, pattern) = c_body.split_once('!').ok_or_else(err_malformed)?;
    if pattern.is_empty() {
        return Err(err_malformed());
    }
    Ok((derive_dir_path(c_dir), pattern.to_string()))
}

/// Split a glob entry into its directory and file-name pattern.
pub(crate) fn split_glob_entry(entry: &str) -> (PathBuf, String) {
    let (c_dir, name) = split_parent_and_name(entry);
    (derive_dir_path(c_dir), name.to_string())
}

fn split_parent_and_name(entry: &str) -> (&str, &str) {
    match entry.rsplit_once('/') {
        Some((c_dir, name)) => (c_dir, name),
        None => ("", entry),
    }
}

fn derive_dir_path(c_dir: &str) -> PathBuf {
    let c_dir_trimmed = c_dir.trim_end_matches('/');
    if c_dir_trimmed.is_empty() {
        if c_dir.starts_with('/') {
            return PathBuf::from("/");
        }
        return PathBuf::from(".");
    }
    PathBuf::from(c_dir_trimmed)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

pub(crate) fn compile_glob(pattern: &str) -> Result<GlobMatcher, DiscoverError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| DiscoverError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

pub(crate) fn compile_regex(pattern: &str) -> Result<Regex, DiscoverError> {
    Regex::new(pattern).map_err(|e| DiscoverError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Basename exclusion globs.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecExcludePatterns {
    l_globs: Vec<GlobMatcher>,
}

impl SpecExcludePatterns {
    pub(crate) fn from_raw(patterns: &[String]) -> Result<Self, DiscoverError> {
        let l_globs = patterns
            .iter()
            .map(|pattern| compile_glob(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { l_globs })
    }

    pub(crate) fn is_excluded(&self, name_file: &str) -> bool {
        self.l_globs.iter().any(|glob| glob.is_match(name_file))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

/// Entry names of `path_dir`, sorted; non UTF-8 names are skipped.
pub(crate) fn list_dir_names(path_dir: &Path) -> Result<Vec<String>, io::Error> {
    let mut l_names = Vec::new();
    for entry in fs::read_dir(path_dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            l_names.push(name.to_string());
        }
    }
    l_names.sort();
    Ok(l_names)
}

pub(crate) fn derive_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
