//! Identifier parsing and control classification.

use std::sync::LazyLock;

use regex::Regex;

use crate::conf::{
    C_CONTROL_MARKER, C_REGEX_LABEL_EXAMINEE, C_REGEX_LABEL_GROUP, C_REGEX_WELL_COL,
    C_REGEX_WELL_ROW,
};
use crate::spec::{PlateError, SpecParsedWell, SpecWellLabel};

static REGEX_WELL_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_REGEX_WELL_ROW).expect("Invalid well row regex"));
static REGEX_WELL_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_REGEX_WELL_COL).expect("Invalid well column regex"));
static REGEX_LABEL_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_REGEX_LABEL_GROUP).expect("Invalid label group regex"));
static REGEX_LABEL_EXAMINEE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(C_REGEX_LABEL_EXAMINEE).expect("Invalid label examinee regex"));

////////////////////////////////////////////////////////////////////////////////
// #region IdentifierParsing

/// Split a well id (e.g. `A01`) into row letter and column number.
///
/// The row is the first ASCII letter (upper-cased), the column the first
/// digit run parsed as base 10. Both must land on the plate.
pub fn parse_well(well: &str) -> Result<SpecParsedWell, PlateError> {
    let Some(m_row) = REGEX_WELL_ROW.find(well) else {
        return Err(create_malformed_well_error(well, "no row letter"));
    };
    let Some(m_col) = REGEX_WELL_COL.find(well) else {
        return Err(create_malformed_well_error(well, "no column number"));
    };

    let c_row = m_row
        .as_str()
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| create_malformed_well_error(well, "no row letter"))?;
    let n_col = m_col
        .as_str()
        .parse::<usize>()
        .map_err(|_| create_malformed_well_error(well, "column number overflow"))?;

    SpecParsedWell::new(c_row, n_col).ok_or_else(|| {
        create_malformed_well_error(
            well,
            &format!("position {c_row}{n_col} is outside the plate (A1..H12)"),
        )
    })
}

/// Leading group token(s) of a label, e.g. `Pos Ctrl` or `UT`.
pub fn parse_label_group(label: &str) -> Option<String> {
    REGEX_LABEL_GROUP
        .find(label)
        .map(|m| m.as_str().to_string())
}

/// Leading numeric token of a label, e.g. `100` in `UT100`.
pub fn parse_label_examinee(label: &str) -> Option<String> {
    REGEX_LABEL_EXAMINEE
        .find(label)
        .map(|m| m.as_str().to_string())
}

fn create_malformed_well_error(well: &str, reason: &str) -> PlateError {
    PlateError::MalformedWellId {
        well: well.to_string(),
        n_idx_record: None,
        reason: reason.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ControlClassification

/// Whether `content` marks a positive/negative control.
pub fn classify_control(content: &str) -> bool {
    content.to_lowercase().contains(C_CONTROL_MARKER)
}

/// Display label: `content` for controls, `sample` otherwise.
pub fn derive_label(content: &str, sample: &str) -> String {
    if classify_control(content) {
        content.to_string()
    } else {
        sample.to_string()
    }
}

/// Display label with its group/examinee decomposition.
pub fn derive_well_label(content: &str, sample: &str) -> SpecWellLabel {
    let text = derive_label(content, sample);
    SpecWellLabel {
        if_is_control: classify_control(content),
        group: parse_label_group(&text),
        examinee: parse_label_examinee(&text),
        text,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
