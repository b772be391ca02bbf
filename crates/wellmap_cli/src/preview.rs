//! Terminal rendering of a projected plate for dry runs.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use wellmap_plate::conf::derive_plate_col_numbers;
use wellmap_plate::{PlateGrid, SpecHighlightRules};

/// Build the 8x12 plate as a table; highlighted cells are bold and tinted.
pub fn build_plate_table(grid: &PlateGrid, rules: &SpecHighlightRules, title: &str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut l_header = vec![header_cell(title)];
    l_header.extend(
        derive_plate_col_numbers()
            .into_iter()
            .map(|n_col| header_cell(&n_col.to_string())),
    );
    table.set_header(l_header);

    for (c_row, row_cells) in grid.rows() {
        let mut l_cells = vec![header_cell(&c_row.to_string())];
        l_cells.extend(row_cells.iter().map(|cell| {
            let value = cell.as_deref();
            let mut cell_out = Cell::new(value.unwrap_or("")).set_alignment(CellAlignment::Center);
            if let Some(style) = rules.resolve(value) {
                cell_out = cell_out.add_attribute(Attribute::Bold);
                if let Some(color) = style
                    .bg_color
                    .as_deref()
                    .or(style.font_color.as_deref())
                    .and_then(derive_terminal_color)
                {
                    cell_out = cell_out.fg(color);
                }
            }
            cell_out
        }));
        table.add_row(l_cells);
    }
    table
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .add_attribute(Attribute::Bold)
        .set_alignment(CellAlignment::Center)
}

/// Terminal approximation of a CSS color name; hex colors are not tinted.
fn derive_terminal_color(text: &str) -> Option<Color> {
    let color = match text.trim().to_ascii_lowercase().as_str() {
        "black" => Color::Black,
        "blue" | "navy" => Color::Blue,
        "cyan" | "aqua" => Color::Cyan,
        "gray" | "grey" | "silver" => Color::Grey,
        "green" | "lime" => Color::Green,
        "magenta" | "fuchsia" | "purple" | "pink" => Color::Magenta,
        "red" | "brown" => Color::Red,
        "white" => Color::White,
        "yellow" | "orange" => Color::Yellow,
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellmap_plate::{SpecWellRecord, project};

    #[test]
    fn plate_table_has_header_and_eight_rows() {
        let grid = project(&[
            SpecWellRecord::new("A01", "Unkn", "UT100"),
            SpecWellRecord::new("H12", "Neg Ctrl", ""),
        ])
        .expect("project");
        let rules = SpecHighlightRules::from_triples(&["Neg Ctrl;;red"]).expect("rules");

        let table = build_plate_table(&grid, &rules, "Well");
        assert_eq!(table.row_iter().count(), 8);

        let c_rendered = table.to_string();
        assert!(c_rendered.contains("UT100"));
        assert!(c_rendered.contains("Neg Ctrl"));
        assert!(c_rendered.contains("Well"));
    }

    #[test]
    fn terminal_colors() {
        assert_eq!(derive_terminal_color("Yellow"), Some(Color::Yellow));
        assert_eq!(derive_terminal_color("#ff0000"), None);
    }
}
