use std::path::Path;

use anyhow::Context;
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

use crate::report::{Cell, Workbook};

/// Writes every sheet to a single `.xlsx` file, header row in bold.
pub fn write_workbook(workbook: &Workbook, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut xlsx = XlsxWorkbook::new();
    let bold = Format::new().set_bold();

    for sheet in &workbook.sheets {
        let worksheet = xlsx.add_worksheet();
        worksheet
            .set_name(&sheet.name)
            .with_context(|| format!("invalid sheet name {:?}", sheet.name))?;

        for (col, title) in sheet.header.iter().enumerate() {
            worksheet.write_string_with_format(0, u16::try_from(col)?, title, &bold)?;
        }

        for (index, row) in sheet.rows.iter().enumerate() {
            let row_num = u32::try_from(index + 1)?;
            for (col, cell) in row.iter().enumerate() {
                let col = u16::try_from(col)?;
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(row_num, col, text)?;
                    }
                    Cell::Number(value) => {
                        worksheet.write_number(row_num, col, *value)?;
                    }
                    Cell::Empty => {}
                }
            }
        }
        tracing::debug!(sheet = %sheet.name, rows = sheet.rows.len(), "wrote sheet");
    }

    xlsx.save(path)
        .with_context(|| format!("failed to save workbook {}", path.display()))?;
    Ok(())
}
