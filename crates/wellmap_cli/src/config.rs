//! YAML run configuration: loading, echo and resolution into a run plan.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use wellmap_io_fs::{SpecDiscoverOptions, expand_env_vars};
use wellmap_io_xlsx::{
    C_MAP_TITLE_DEFAULT, C_SHEET_NAME_MAP_DEFAULT, EnumSheetSelector, L_APPEND_COLUMNS_DEFAULT,
    L_IMAGE_EXTENSIONS_DEFAULT, SpecColumnMap, SpecMapSheetOptions, derive_map_workbook_glob,
};
use wellmap_plate::SpecHighlightRules;

/// File name looked up when no `--yml` is given.
pub const C_CONFIG_FILE_NAME_DEFAULT: &str = "trial.yaml";
/// Directory next to the executable searched first.
pub const C_CONFIG_SUBDIR_DEFAULT: &str = "yaml";

const C_ENTRY_SEP: char = ';';

////////////////////////////////////////////////////////////////////////////////
// #region ConfigModel

/// Root of the YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecConfig {
    /// Where the source tables live and how to read them.
    pub inp: SpecInputConfig,
    /// Where and how the map is written.
    #[serde(default)]
    pub out: SpecOutputConfig,
}

/// `inp` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecInputConfig {
    /// Directory prefixed to every entry of `files`.
    pub path: String,
    /// Literal, glob or `dir/!<regex>!regex` entries.
    pub files: Vec<String>,
    /// Table layout.
    #[serde(default)]
    pub data: SpecDataConfig,
}

/// `inp.data` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDataConfig {
    /// Worksheet holding the table: a position (`0`) or a name (`'0'`).
    #[serde(default)]
    pub ws_name: EnumSheetRef,
    /// `semantic;header` pairs for `Well`, `Content` and `Sample`.
    #[serde(default)]
    pub cols: Vec<String>,
    /// `pattern;background;text` highlight rules, first match wins.
    #[serde(default)]
    pub highlight: Vec<String>,
    /// Companion image extensions, tried in order.
    #[serde(default = "derive_default_image_extensions")]
    pub img: Vec<String>,
    /// Source columns copied below the map.
    #[serde(default = "derive_default_append_cols")]
    pub append_cols: Vec<String>,
}

impl Default for SpecDataConfig {
    fn default() -> Self {
        Self {
            ws_name: EnumSheetRef::default(),
            cols: Vec::new(),
            highlight: Vec::new(),
            img: derive_default_image_extensions(),
            append_cols: derive_default_append_cols(),
        }
    }
}

/// YAML form of a worksheet reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumSheetRef {
    /// Zero-based position.
    Index(usize),
    /// Sheet name.
    Name(String),
}

impl Default for EnumSheetRef {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl From<&EnumSheetRef> for EnumSheetSelector {
    fn from(value: &EnumSheetRef) -> Self {
        match value {
            EnumSheetRef::Index(n_idx) => EnumSheetSelector::Index(*n_idx),
            EnumSheetRef::Name(name) => EnumSheetSelector::Name(name.clone()),
        }
    }
}

/// `out` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecOutputConfig {
    /// Name of the map sheet.
    #[serde(default = "derive_default_sheet_name")]
    pub sheet_name: String,
    /// Corner cell text of the map.
    #[serde(default = "derive_default_title")]
    pub title: String,
    /// Write map workbooks here instead of next to their sources.
    #[serde(default)]
    pub dir: Option<String>,
    /// Files converted in parallel; unset means one per CPU, at most 8.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for SpecOutputConfig {
    fn default() -> Self {
        Self {
            sheet_name: derive_default_sheet_name(),
            title: derive_default_title(),
            dir: None,
            workers: None,
        }
    }
}

fn derive_default_image_extensions() -> Vec<String> {
    L_IMAGE_EXTENSIONS_DEFAULT
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn derive_default_append_cols() -> Vec<String> {
    L_APPEND_COLUMNS_DEFAULT
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn derive_default_sheet_name() -> String {
    C_SHEET_NAME_MAP_DEFAULT.to_string()
}

fn derive_default_title() -> String {
    C_MAP_TITLE_DEFAULT.to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RunPlan

/// Validated, ready-to-run form of [`SpecConfig`].
#[derive(Debug, Clone)]
pub struct SpecRunPlan {
    /// Input directory, unexpanded; discovery expands it.
    pub dir_input: String,
    /// Raw file entries.
    pub entries: Vec<String>,
    /// Worksheet holding the table.
    pub sheet_selector: EnumSheetSelector,
    /// Source headers of the projected columns.
    pub column_map: SpecColumnMap,
    /// Compiled highlight rules.
    pub rules: SpecHighlightRules,
    /// Companion image extensions.
    pub exts_image: Vec<String>,
    /// Map sheet name, title and append columns.
    pub options_map: SpecMapSheetOptions,
    /// Output directory; `None` writes `<stem>_wellmap.xlsx` next to each source.
    pub dir_output: Option<PathBuf>,
    /// Requested worker count.
    pub n_workers: Option<usize>,
    /// Non-fatal configuration issues.
    pub warnings: Vec<String>,
}

impl SpecRunPlan {
    /// Discovery options skipping lock files and earlier map workbooks.
    pub fn discover_options(&self) -> SpecDiscoverOptions {
        let mut spec_options = SpecDiscoverOptions::default();
        spec_options
            .patterns_exclude_files
            .push(derive_map_workbook_glob());
        spec_options
    }
}

impl SpecConfig {
    /// Validate every entry and compile rules.
    pub fn resolve(&self) -> Result<SpecRunPlan, ConfigError> {
        let data = &self.inp.data;
        let (column_map, warnings) = parse_column_map(&data.cols)?;
        for warning in &warnings {
            warn!("{warning}");
        }

        let rules = SpecHighlightRules::from_triples(&data.highlight).map_err(|e| {
            ConfigError::ConfigInvalid {
                field: "inp.data.highlight".to_string(),
                message: e.to_string(),
            }
        })?;

        if self.out.workers == Some(0) {
            return Err(ConfigError::ConfigInvalid {
                field: "out.workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(SpecRunPlan {
            dir_input: self.inp.path.clone(),
            entries: self.inp.files.clone(),
            sheet_selector: EnumSheetSelector::from(&data.ws_name),
            column_map,
            rules,
            exts_image: data.img.clone(),
            options_map: SpecMapSheetOptions {
                sheet_name: self.out.sheet_name.clone(),
                title: self.out.title.clone(),
                cols_append: data.append_cols.clone(),
            },
            dir_output: self
                .out
                .dir
                .as_deref()
                .map(|dir| PathBuf::from(expand_env_vars(dir))),
            n_workers: self.out.workers,
            warnings,
        })
    }
}

/// Parse `semantic;header` pairs over the default column map.
///
/// Keys are `Well`, `Content` or `Sample` in any case; an empty header
/// keeps the semantic name. A header that is a bare column letter (`B`,
/// `AA`) is the older `key;letter` form, where the key itself names the
/// header. Unknown keys are returned as warnings.
pub fn parse_column_map<S: AsRef<str>>(
    entries: &[S],
) -> Result<(SpecColumnMap, Vec<String>), ConfigError> {
    let mut column_map = SpecColumnMap::default();
    let mut l_warnings = Vec::new();

    for entry in entries {
        let entry = entry.as_ref();
        let Some((key, header)) = entry.split_once(C_ENTRY_SEP) else {
            return Err(ConfigError::ConfigInvalid {
                field: "inp.data.cols".to_string(),
                message: format!("expected `semantic;header`, got {entry:?}"),
            });
        };
        if header.contains(C_ENTRY_SEP) {
            return Err(ConfigError::ConfigInvalid {
                field: "inp.data.cols".to_string(),
                message: format!("expected `semantic;header`, got {entry:?}"),
            });
        }

        let key = key.trim();
        let header = header.trim();
        let slot = match key.to_ascii_lowercase().as_str() {
            "well" => &mut column_map.well,
            "content" => &mut column_map.content,
            "sample" => &mut column_map.sample,
            _ => {
                l_warnings.push(format!("Unknown column key ignored: {key:?}"));
                continue;
            }
        };
        if is_column_letter(header) {
            *slot = key.to_string();
        } else if !header.is_empty() {
            *slot = header.to_string();
        }
    }

    Ok((column_map, l_warnings))
}

fn is_column_letter(text: &str) -> bool {
    (1..=3).contains(&text.len()) && text.chars().all(|c| c.is_ascii_uppercase())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Loading

/// Configuration failures; all are fatal before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML file does not exist.
    #[error("YAML file not found: {}", .0.display())]
    ConfigMissing(PathBuf),

    /// The YAML file exists but cannot be read.
    #[error("failed to read {}: {source}", .path.display())]
    ConfigRead {
        /// YAML file.
        path: PathBuf,
        /// I/O error.
        source: io::Error,
    },

    /// The YAML text does not match the configuration model.
    #[error("failed to parse {}: {message}", .path.display())]
    ConfigParse {
        /// YAML file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A field is present but unusable.
    #[error("invalid {field}: {message}")]
    ConfigInvalid {
        /// Dotted field path.
        field: String,
        /// What is wrong.
        message: String,
    },
}

/// Default YAML location: `<exe dir>/yaml/trial.yaml` when it exists, else
/// `./trial.yaml`.
pub fn derive_default_config_path(dir_exe: Option<&Path>) -> PathBuf {
    dir_exe
        .map(|dir| {
            dir.join(C_CONFIG_SUBDIR_DEFAULT)
                .join(C_CONFIG_FILE_NAME_DEFAULT)
        })
        .filter(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(".").join(C_CONFIG_FILE_NAME_DEFAULT))
}

/// Parse configuration text; `path` is only used in errors.
pub fn parse_config(text: &str, path: &Path) -> Result<SpecConfig, ConfigError> {
    serde_yml::from_str(text).map_err(|e| ConfigError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read and parse a YAML configuration file.
pub fn load_config(path: &Path) -> Result<SpecConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::ConfigMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text, path)
}

/// Bordered dump of the parsed configuration.
pub fn derive_config_echo(path: &Path, config: &SpecConfig) -> Result<String, ConfigError> {
    let c_yaml = serde_yml::to_string(config).map_err(|e| ConfigError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let c_border = "-".repeat(70);
    Ok(format!(
        "{c_border}\nContent of [{}]\n{c_border}\n{c_yaml}",
        path.display()
    ))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const C_YAML_FULL: &str = r#"
inp:
  path: /data/pcr
  files:
    - '!(?i)admin.*[.]xlsx!regex'
  data:
    ws_name: '0'
    cols: ['Well;Well', 'Content;Content', 'Sample;Sample Name']
    highlight: ['Pos Ctrl;yellow;', 'Neg Ctrl;;red']
    img: [png]
    append_cols: [Well, Cq]
out:
  sheet_name: plate
  workers: 2
"#;

    fn parse(text: &str) -> SpecConfig {
        parse_config(text, Path::new("trial.yaml")).expect("parse")
    }

    #[test]
    fn full_config_resolves() {
        let config = parse(C_YAML_FULL);
        assert_eq!(config.inp.data.ws_name, EnumSheetRef::Name("0".to_string()));

        let plan = config.resolve().expect("resolve");
        assert_eq!(plan.sheet_selector, EnumSheetSelector::Name("0".to_string()));
        assert_eq!(plan.column_map.sample, "Sample Name");
        assert_eq!(plan.rules.len(), 2);
        assert_eq!(plan.exts_image, vec!["png"]);
        assert_eq!(plan.options_map.sheet_name, "plate");
        assert_eq!(plan.options_map.title, C_MAP_TITLE_DEFAULT);
        assert_eq!(plan.options_map.cols_append, vec!["Well", "Cq"]);
        assert_eq!(plan.n_workers, Some(2));
        assert!(plan.dir_output.is_none());
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("inp:\n  path: .\n  files: [run.xlsx]\n");
        assert_eq!(config.inp.data.ws_name, EnumSheetRef::Index(0));
        let plan = config.resolve().expect("resolve");
        assert_eq!(plan.column_map, SpecColumnMap::default());
        assert!(plan.rules.is_empty());
        assert_eq!(plan.exts_image, vec!["png", "jpg", "bmp"]);
        assert_eq!(plan.options_map, SpecMapSheetOptions::default());
        assert_eq!(
            plan.discover_options().patterns_exclude_files,
            vec!["~$*".to_string(), "*_wellmap.xlsx".to_string()]
        );
    }

    #[test]
    fn integer_sheet_reference_is_a_position() {
        let config = parse("inp:\n  path: .\n  files: []\n  data:\n    ws_name: 2\n");
        assert_eq!(config.inp.data.ws_name, EnumSheetRef::Index(2));
    }

    #[test]
    fn column_map_keys_and_warnings() {
        let (column_map, l_warnings) =
            parse_column_map(&["WELL;Pos", "content;", "Target;Target"]).expect("cols");
        assert_eq!(column_map.well, "Pos");
        assert_eq!(column_map.content, "Content");
        assert_eq!(l_warnings.len(), 1);

        let (column_map, _) =
            parse_column_map(&["Well;B", "Content;E", "Sample;Sample Name"]).expect("cols");
        assert_eq!(column_map.well, "Well");
        assert_eq!(column_map.content, "Content");
        assert_eq!(column_map.sample, "Sample Name");

        let (column_map, _) = parse_column_map(&["Well;Pos", "Sample;AB"]).expect("cols");
        assert_eq!(column_map.well, "Pos");
        assert_eq!(column_map.sample, "Sample");

        for entry in ["Well", "Well;A;B"] {
            assert!(matches!(
                parse_column_map(&[entry]),
                Err(ConfigError::ConfigInvalid { field, .. }) if field == "inp.data.cols"
            ));
        }
    }

    #[test]
    fn invalid_highlight_and_workers_rejected() {
        let mut config = parse("inp:\n  path: .\n  files: []\n");
        config.inp.data.highlight = vec!["Pos Ctrl;yellow".to_string()];
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::ConfigInvalid { field, .. }) if field == "inp.data.highlight"
        ));

        config.inp.data.highlight.clear();
        config.out.workers = Some(0);
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::ConfigInvalid { field, .. }) if field == "out.workers"
        ));
    }

    #[test]
    fn missing_and_unparsable_files() {
        let path_missing = std::env::temp_dir().join("wellmap_no_such_config.yaml");
        assert!(matches!(
            load_config(&path_missing),
            Err(ConfigError::ConfigMissing(_))
        ));
        assert!(matches!(
            parse_config("inp: [", Path::new("bad.yaml")),
            Err(ConfigError::ConfigParse { .. })
        ));
        assert!(matches!(
            parse_config("out: {}\n", Path::new("no_inp.yaml")),
            Err(ConfigError::ConfigParse { .. })
        ));
    }

    #[test]
    fn default_config_path_falls_back_to_cwd() {
        let path = derive_default_config_path(Some(Path::new("/nonexistent/wellmap")));
        assert_eq!(path, PathBuf::from(".").join("trial.yaml"));
        assert_eq!(derive_default_config_path(None), path);
    }

    #[test]
    fn echo_is_bordered_yaml() {
        let config = parse(C_YAML_FULL);
        let c_echo = derive_config_echo(Path::new("trial.yaml"), &config).expect("echo");
        assert!(c_echo.starts_with(&"-".repeat(70)));
        assert!(c_echo.contains("Content of [trial.yaml]"));
        assert_eq!(parse(c_echo.lines().skip(3).collect::<Vec<_>>().join("\n").as_str()), config);
    }
}
