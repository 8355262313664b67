use super::ReportError;
use crate::domain::CompletedPair;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Pretty-printed JSON array of pair records.
pub fn write_json(pairs: &[CompletedPair], path: &Path) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, pairs)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
