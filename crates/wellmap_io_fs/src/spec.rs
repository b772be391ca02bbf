//! Discovery specification models and top-level error types.

use std::path::PathBuf;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// How one configured file entry is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumDiscoverEntryKind {
    /// Taken verbatim.
    Literal,
    /// Shell-like wildcards (`*`, `?`, character classes) on the file name.
    Glob,
    /// `dir/!<regex>!regex` hook; names in `dir` matching `<regex>`.
    Regex,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `discover_tables`.
#[derive(Debug, Clone)]
pub struct SpecDiscoverOptions {
    /// Glob patterns applied to file basename; matches are dropped.
    pub patterns_exclude_files: Vec<String>,
    /// Expand `$VAR` / `${VAR}` in the directory and entries.
    pub if_expand_env_vars: bool,
}

impl Default for SpecDiscoverOptions {
    fn default() -> Self {
        Self {
            // Excel lock files, e.g. `~$run.xlsx`.
            patterns_exclude_files: vec!["~$*".to_string()],
            if_expand_env_vars: true,
        }
    }
}

/// "Top-level call failed" errors (input validation stage).
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// Invalid glob or regex in an entry or exclusion list.
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// A regex hook entry is not `dir/!<regex>!regex`.
    #[error("malformed regex entry {entry:?}: expected `dir/!<regex>!regex`")]
    MalformedRegexEntry {
        /// Raw entry.
        entry: String,
    },

    /// The input directory itself does not exist.
    #[error("input directory not found: {}", .0.display())]
    InputDirectoryNotFound(PathBuf),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
