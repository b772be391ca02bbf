//! Plate template and table-to-grid projection.

use crate::spec::{PlateError, PlateGrid, SpecProjectionReport, SpecWellRecord};
use crate::util::{derive_well_label, parse_well};

/// Canonical all-empty 8x12 grid used as merge base.
pub fn build_template() -> PlateGrid {
    PlateGrid::default()
}

/// Pivot flat records into the plate grid.
///
/// See [`project_with_report`].
pub fn project(records: &[SpecWellRecord]) -> Result<PlateGrid, PlateError> {
    project_with_report(records).map(|(grid, _)| grid)
}

/// Pivot flat records into the plate grid and count what happened.
///
/// Records are applied in input order, so a well listed twice keeps the
/// label of its last record. A blank label leaves the cell empty. Any
/// malformed well id fails the whole projection; nothing partial is
/// returned.
pub fn project_with_report(
    records: &[SpecWellRecord],
) -> Result<(PlateGrid, SpecProjectionReport), PlateError> {
    let mut grid_working = PlateGrid::default();
    let mut report = SpecProjectionReport {
        cnt_records: records.len(),
        ..Default::default()
    };

    for (n_idx, record) in records.iter().enumerate() {
        let well = parse_well(&record.well).map_err(|e| e.with_record(n_idx))?;
        let label = derive_well_label(&record.content, &record.sample);

        if label.if_is_control {
            report.cnt_controls += 1;
        }
        if let Some(group) = &label.group {
            report.groups.insert(group.clone());
        }

        let value = if label.text.trim().is_empty() {
            report.cnt_blank_labels += 1;
            None
        } else {
            Some(label.text)
        };
        if grid_working.set(&well, value).is_some() {
            report.cnt_duplicates += 1;
        }
    }

    let grid = build_template().merge(&grid_working);
    report.cnt_loaded = grid.count_loaded();
    Ok((grid, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::N_PLATE_WELLS;
    use crate::spec::SpecParsedWell;

    fn well(row: char, col: usize) -> SpecParsedWell {
        SpecParsedWell::new(row, col).expect("on plate")
    }

    #[test]
    fn test_build_template_is_total_and_deterministic() {
        let grid_a = build_template();
        let grid_b = build_template();
        assert_eq!(grid_a.len(), N_PLATE_WELLS);
        assert_eq!(grid_a.iter().count(), N_PLATE_WELLS);
        assert_eq!(grid_a.count_loaded(), 0);
        assert_eq!(grid_a, grid_b);
    }

    #[test]
    fn test_project_empty_equals_template() {
        assert_eq!(project(&[]).expect("project"), build_template());
    }

    #[test]
    fn test_project_end_to_end() {
        let records = vec![
            SpecWellRecord::new("A01", "Unkn", "UT100"),
            SpecWellRecord::new("A02", "Pos Ctrl", "x"),
        ];
        let grid = project(&records).expect("project");

        assert_eq!(grid.len(), N_PLATE_WELLS);
        assert_eq!(grid.get(&well('A', 1)), Some("UT100"));
        assert_eq!(grid.get(&well('A', 2)), Some("Pos Ctrl"));
        assert_eq!(grid.count_loaded(), 2);
        assert_eq!(
            grid.iter()
                .filter(|(w, _)| *w != well('A', 1) && *w != well('A', 2))
                .filter(|(_, v)| v.is_none())
                .count(),
            94
        );
    }

    #[test]
    fn test_project_full_plate_stays_total() {
        let records = (0..N_PLATE_WELLS)
            .map(|n| {
                let c_row = (b'A' + (n / 12) as u8) as char;
                SpecWellRecord::new(format!("{c_row}{:02}", n % 12 + 1), "Unkn", format!("UT{n}"))
            })
            .collect::<Vec<_>>();
        let grid = project(&records).expect("project");
        assert_eq!(grid.len(), N_PLATE_WELLS);
        assert_eq!(grid.count_loaded(), N_PLATE_WELLS);
        assert_eq!(grid.get(&well('H', 12)), Some("UT95"));
    }

    #[test]
    fn test_project_duplicates_last_write_wins() {
        let records = vec![
            SpecWellRecord::new("A01", "Unkn", "L1"),
            SpecWellRecord::new("A01", "Unkn", "L2"),
        ];
        let (grid, report) = project_with_report(&records).expect("project");
        assert_eq!(grid.get(&well('A', 1)), Some("L2"));
        assert_eq!(report.cnt_duplicates, 1);
        assert_eq!(report.cnt_loaded, 1);
    }

    #[test]
    fn test_project_malformed_aborts_everything() {
        let records = vec![
            SpecWellRecord::new("A01", "Unkn", "UT1"),
            SpecWellRecord::new("99", "Unkn", "UT2"),
            SpecWellRecord::new("A03", "Unkn", "UT3"),
        ];
        let err = project(&records).expect_err("must fail");
        assert_eq!(
            err,
            PlateError::MalformedWellId {
                well: "99".to_string(),
                n_idx_record: Some(1),
                reason: "no row letter".to_string(),
            }
        );
    }

    #[test]
    fn test_project_report_counts() {
        let records = vec![
            SpecWellRecord::new("A01", "Unkn", "UT100"),
            SpecWellRecord::new("A02", "Unkn", "KE7"),
            SpecWellRecord::new("H12", "Neg Ctrl", ""),
            SpecWellRecord::new("B01", "Unkn", "  "),
        ];
        let (grid, report) = project_with_report(&records).expect("project");
        assert_eq!(report.cnt_records, 4);
        assert_eq!(report.cnt_controls, 1);
        assert_eq!(report.cnt_blank_labels, 1);
        assert_eq!(report.cnt_loaded, 3);
        assert_eq!(
            report.groups.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["KE", "Neg Ctrl", "UT"]
        );
        assert_eq!(grid.get(&well('B', 1)), None);
    }
}
