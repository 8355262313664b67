//! Spreadsheet report with live profit formulas.

use super::ReportError;
use crate::domain::CompletedPair;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use std::path::Path;

const HEADERS: [&str; 12] = [
    "Item Name",
    "Float",
    "Phase",
    "Pattern",
    "Buy Source",
    "Buy Price",
    "Buy Date",
    "Sell Source",
    "Sell Price",
    "Sell Date",
    "Profit ($)",
    "Profit (%)",
];

const MAX_COLUMN_CHARS: usize = 60;
const WIDTH_FACTOR: f64 = 1.2;
const PROFIT_GREEN: u32 = 0x006100;
const LOSS_RED: u32 = 0x9C0006;

/// Tracks the widest text written to each column.
struct ColumnWidths([usize; HEADERS.len()]);

impl ColumnWidths {
    fn new() -> Self {
        let mut widths = [0; HEADERS.len()];
        for (i, header) in HEADERS.iter().enumerate() {
            widths[i] = header.chars().count() + 2;
        }
        Self(widths)
    }

    fn observe(&mut self, col: u16, text: &str) {
        let slot = &mut self.0[col as usize];
        *slot = (*slot).max(text.chars().count());
    }

    fn apply(&self, sheet: &mut Worksheet) -> Result<(), ReportError> {
        for (col, chars) in self.0.iter().enumerate() {
            let width = (*chars).min(MAX_COLUMN_CHARS) as f64 * WIDTH_FACTOR;
            sheet.set_column_width(col as u16, width)?;
        }
        Ok(())
    }
}

/// Write text and remember its width.
fn put_text(
    sheet: &mut Worksheet,
    widths: &mut ColumnWidths,
    row: u32,
    col: u16,
    text: &str,
) -> Result<(), ReportError> {
    sheet.write_string(row, col, text)?;
    widths.observe(col, text);
    Ok(())
}

fn put_number(
    sheet: &mut Worksheet,
    widths: &mut ColumnWidths,
    row: u32,
    col: u16,
    value: f64,
) -> Result<(), ReportError> {
    sheet.write_number(row, col, value)?;
    widths.observe(col, &value.to_string());
    Ok(())
}

/// Rows are sorted newest sale first. Profit columns are formulas over the
/// price cells so edits in the sheet recompute; the stored profit decides
/// only the colouring.
pub fn write_xlsx(pairs: &[CompletedPair], path: &Path) -> Result<(), ReportError> {
    let mut sorted: Vec<&CompletedPair> = pairs.iter().collect();
    sorted.sort_by(|a, b| b.sell.time_ms.cmp(&a.sell.time_ms));

    let green = Format::new().set_font_color(Color::RGB(PROFIT_GREEN)).set_bold();
    let red = Format::new().set_font_color(Color::RGB(LOSS_RED)).set_bold();
    let percent = Format::new().set_num_format("0.00%");
    let bold = Format::new().set_bold();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let mut widths = ColumnWidths::new();

    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    let mut last_row = 0u32;
    for (i, pair) in sorted.iter().enumerate() {
        let row = i as u32 + 1;
        // 1-based row number used in A1 references.
        let n = row + 1;
        last_row = row;

        put_text(sheet, &mut widths, row, 0, &pair.item_name)?;
        put_number(sheet, &mut widths, row, 1, pair.wear)?;
        put_text(sheet, &mut widths, row, 2, &pair.phase)?;
        if let Some(pattern) = pair.pattern {
            put_number(sheet, &mut widths, row, 3, f64::from(pattern))?;
        }

        match &pair.buy {
            Some(buy) => {
                put_text(sheet, &mut widths, row, 4, &buy.source)?;
                put_number(sheet, &mut widths, row, 5, buy.price.to_f64())?;
                put_text(sheet, &mut widths, row, 6, &buy.time_ms.format_minutes())?;
            }
            None => {
                put_text(sheet, &mut widths, row, 4, crate::domain::UNMATCHED_SOURCE)?;
                put_number(sheet, &mut widths, row, 5, 0.0)?;
                put_text(sheet, &mut widths, row, 6, "-")?;
            }
        }

        put_text(sheet, &mut widths, row, 7, &pair.sell.source)?;
        put_number(sheet, &mut widths, row, 8, pair.sell.price.to_f64())?;
        put_text(sheet, &mut widths, row, 9, &pair.sell.time_ms.format_minutes())?;

        let profit_formula = format!("=IF(F{n}=0,0,I{n}-F{n})");
        if pair.profit.is_positive() {
            sheet.write_formula_with_format(row, 10, profit_formula.as_str(), &green)?;
        } else if pair.profit.is_negative() {
            sheet.write_formula_with_format(row, 10, profit_formula.as_str(), &red)?;
        } else {
            sheet.write_formula(row, 10, profit_formula.as_str())?;
        }
        sheet.write_formula_with_format(
            row,
            11,
            format!("=IFERROR(K{n}/F{n},0)").as_str(),
            &percent,
        )?;
    }

    let total_row = last_row + 2;
    sheet.write_string_with_format(total_row, 9, "TOTAL PROFIT:", &bold)?;
    sheet.write_formula_with_format(
        total_row,
        10,
        format!("=SUM(K2:K{})", last_row.max(1) + 1).as_str(),
        &bold,
    )?;

    sheet.autofilter(0, 0, 0, (HEADERS.len() - 1) as u16)?;
    widths.apply(sheet)?;

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_widths_capped() {
        let mut widths = ColumnWidths::new();
        assert_eq!(widths.0[0], "Item Name".len() + 2);
        widths.observe(0, &"x".repeat(200));
        widths.observe(1, "0.1");
        assert_eq!(widths.0[0], 200);
        assert_eq!(widths.0[1], "Float".len() + 2);
        assert_eq!(widths.0[0].min(MAX_COLUMN_CHARS), 60);
    }
}
