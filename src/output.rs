use std::io::Write;

use crate::{error::Error, merge::Bom};

/// Shortest plain decimal that reads back as the same number, always with a
/// fractional part, e.g. `1.5`, `90.0`, `0.00001`
pub fn format_decimal(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        text + ".0"
    }
}

/// Write the BOM as CSV: a header row of `columns`, then one row per record
/// in reference order. Fields outside `columns` are dropped, missing ones
/// are left empty.
pub fn write_csv<W: Write>(bom: &Bom, columns: &[String], writer: W) -> Result<(), Error> {
    let mut out = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    out.write_record(columns)?;
    for record in bom.records() {
        out.write_record(columns.iter().map(|column| record.get(column).unwrap_or("")))?;
    }
    out.flush()?;
    Ok(())
}
