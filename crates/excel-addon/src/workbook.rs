//! Sheet reads and row upserts

use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use excel_addon_protocol::{Table, UpdateCell};
use umya_spreadsheet::{reader, writer, Style, Worksheet};

use crate::error::{AddonError, AddonResult};
use crate::formula::adjust_formula_references;

/// Read every row of `sheet_name`, rendering each cell as a string.
pub fn read_sheet(path: &Path, sheet_name: &str) -> AddonResult<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range(sheet_name)?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect())
}

/// Update the row whose key column matches, or append a new row.
///
/// The first cell of `cells` is the key. Appended rows inherit the styles of
/// the previous last row, and its formulas (for columns not being written)
/// are copied with their row references shifted.
pub fn upsert_row(path: &Path, sheet_name: &str, cells: &[UpdateCell]) -> AddonResult<()> {
    let key = cells.first().ok_or(AddonError::EmptyRow)?;
    if cells.iter().any(|c| c.column_index == 0) {
        return Err(AddonError::ZeroColumn);
    }
    if !path.exists() {
        return Err(AddonError::FileNotFound(path.to_path_buf()));
    }

    let mut book = reader::xlsx::read(path).map_err(|e| AddonError::Workbook(e.to_string()))?;
    let sheet = book
        .get_sheet_by_name_mut(sheet_name)
        .ok_or_else(|| AddonError::SheetNotFound(sheet_name.to_string()))?;

    let existing = (1..=sheet.get_highest_row())
        .find(|&row| sheet.get_formatted_value((key.column_index, row)) == key.value);

    match existing {
        Some(row) => {
            for cell in cells {
                sheet
                    .get_cell_mut((cell.column_index, row))
                    .set_value(cell.value.clone());
            }
        }
        None => append_row(sheet, cells),
    }

    writer::xlsx::write(&book, path).map_err(|e| AddonError::Workbook(e.to_string()))
}

fn append_row(sheet: &mut Worksheet, cells: &[UpdateCell]) {
    let template_row = sheet.get_highest_row();
    let new_row = template_row + 1;

    let mut styles: Vec<(u32, Style)> = Vec::new();
    let mut formulas: Vec<(u32, String)> = Vec::new();
    if template_row > 0 {
        let written: HashSet<u32> = cells.iter().map(|c| c.column_index).collect();
        for col in 1..=sheet.get_highest_column() {
            let Some(cell) = sheet.get_cell((col, template_row)) else {
                continue;
            };
            styles.push((col, cell.get_style().clone()));
            if cell.is_formula() && !written.contains(&col) {
                formulas.push((col, cell.get_formula().to_string()));
            }
        }
    }

    for (col, style) in styles {
        sheet.get_cell_mut((col, new_row)).set_style(style);
    }
    for cell in cells {
        sheet
            .get_cell_mut((cell.column_index, new_row))
            .set_value(cell.value.clone());
    }
    for (col, formula) in formulas {
        sheet
            .get_cell_mut((col, new_row))
            .set_formula(adjust_formula_references(&formula, template_row, new_row));
    }
}
